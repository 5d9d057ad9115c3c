use std::fmt;

use bytes::BufMut;

use crate::{CommsErr, Deserialize, Result, Serialize};

/// The fixed vocabulary of control tokens exchanged between master and workers.
///
/// Every token is a whole message and is compared by exact match. None of them
/// starts with `(` or a digit, so they never collide with points or counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token {
    GreetServer,
    GreetClient,
    SendDataRequest,
    Ready,
    RequestForK,
    SendClassificationDataRequest,
    AllowProceed,
}

impl Token {
    const ALL: [Token; 7] = [
        Token::GreetServer,
        Token::GreetClient,
        Token::SendDataRequest,
        Token::Ready,
        Token::RequestForK,
        Token::SendClassificationDataRequest,
        Token::AllowProceed,
    ];

    /// The exact bytes that represent this token on the wire.
    pub const fn as_bytes(self) -> &'static [u8] {
        match self {
            Token::GreetServer => b"Request for connection",
            Token::GreetClient => b"Connection established",
            Token::SendDataRequest => b"Ready to receive data",
            Token::Ready => b"Ready",
            Token::RequestForK => b"Request for k",
            Token::SendClassificationDataRequest => b"Ready to send classification data",
            Token::AllowProceed => b"Proceed",
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Token::GreetServer => "GREET_SERVER",
            Token::GreetClient => "GREET_CLIENT",
            Token::SendDataRequest => "SEND_DATA_REQUEST",
            Token::Ready => "READY",
            Token::RequestForK => "REQUEST_FOR_K",
            Token::SendClassificationDataRequest => "SEND_CLASSIFICATION_DATA_REQUEST",
            Token::AllowProceed => "ALLOW_PROCEED",
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Serialize for Token {
    fn serialize<B: BufMut>(&self, buf: &mut B) {
        buf.put_slice(self.as_bytes());
    }
}

impl Deserialize for Token {
    fn deserialize(buf: &[u8]) -> Result<Self> {
        Token::ALL
            .into_iter()
            .find(|token| token.as_bytes() == buf)
            .ok_or_else(|| CommsErr::violation("a control token", buf))
    }
}

/// A non negative integer sent as decimal text: batch sizes, `k` and the worker count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Count(pub usize);

impl Serialize for Count {
    fn serialize<B: BufMut>(&self, buf: &mut B) {
        buf.put_slice(self.0.to_string().as_bytes());
    }
}

impl Deserialize for Count {
    fn deserialize(buf: &[u8]) -> Result<Self> {
        std::str::from_utf8(buf)
            .ok()
            .filter(|text| !text.is_empty() && text.bytes().all(|b| b.is_ascii_digit()))
            .and_then(|text| text.parse().ok())
            .map(Count)
            .ok_or_else(|| CommsErr::violation("a decimal count", buf))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bytes_of<T: Serialize>(msg: &T) -> Vec<u8> {
        let mut buf = Vec::new();
        msg.serialize(&mut buf);
        buf
    }

    #[test]
    fn tokens_are_distinct() {
        for a in Token::ALL {
            for b in Token::ALL {
                assert_eq!(a == b, a.as_bytes() == b.as_bytes());
            }
        }
    }

    #[test]
    fn token_roundtrip() {
        for token in Token::ALL {
            let buf = bytes_of(&token);
            assert_eq!(Token::deserialize(&buf).unwrap(), token);
        }
    }

    #[test]
    fn token_requires_exact_match() {
        assert!(Token::deserialize(b"Ready!").is_err());
        assert!(Token::deserialize(b"ready").is_err());
        assert!(Token::deserialize(b"").is_err());
        assert_eq!(Token::deserialize(b"Ready").unwrap(), Token::Ready);
    }

    #[test]
    fn count_is_decimal_text() {
        assert_eq!(bytes_of(&Count(0)), b"0");
        assert_eq!(bytes_of(&Count(1234)), b"1234");
        assert_eq!(Count::deserialize(b"0042").unwrap(), Count(42));
    }

    #[test]
    fn count_rejects_non_decimal() {
        let cases: [&[u8]; 7] = [b"", b"-1", b"+1", b"1.5", b" 3", b"abc", b"99999999999999999999999"];

        for bad in cases {
            assert!(
                matches!(
                    Count::deserialize(bad),
                    Err(CommsErr::ProtocolViolation { .. })
                ),
                "{bad:?} should be rejected"
            );
        }
    }
}
