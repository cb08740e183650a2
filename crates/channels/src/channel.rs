use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::Error;

/// Delivery mechanism of a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    /// Group messaging through a linked signal-cli account.
    Signal,
    /// Bot chat.
    Telegram,
    /// Browser push (encrypted) or a plain HTTP callback.
    WebPush,
}

impl Channel {
    pub const ALL: [Self; 3] = [Self::Signal, Self::Telegram, Self::WebPush];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Signal => "signal",
            Self::Telegram => "telegram",
            Self::WebPush => "webpush",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Channel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "signal" => Ok(Self::Signal),
            "telegram" => Ok(Self::Telegram),
            "webpush" => Ok(Self::WebPush),
            other => Err(Error::invalid_input(format!("unknown channel: {other}"))),
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, rstest::rstest};

    #[rstest]
    #[case(Channel::Signal, "signal")]
    #[case(Channel::Telegram, "telegram")]
    #[case(Channel::WebPush, "webpush")]
    fn str_and_serde_names_agree(#[case] channel: Channel, #[case] name: &str) {
        assert_eq!(channel.as_str(), name);
        assert_eq!(name.parse::<Channel>().unwrap(), channel);
        assert_eq!(serde_json::to_value(channel).unwrap(), name);
    }

    #[test]
    fn unknown_channel_is_invalid_input() {
        assert!(matches!(
            "sms".parse::<Channel>(),
            Err(Error::InvalidInput { .. })
        ));
    }
}
