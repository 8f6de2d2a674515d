//! 레코드 프레이밍
//!
//! - [`Framing::NewlineDelimited`]: 레코드마다 `\n` (기본값). 빈 줄은 건너뜁니다.
//! - [`Framing::LengthPrefixed`]: 4바이트 big-endian 길이 + 페이로드
//!
//! 최대 크기를 넘는 프레임은 스트림을 다시 동기화할 수 없으므로 연결을 종료합니다.

use std::fmt;
use std::str::FromStr;

use bytes::{BufMut, Bytes, BytesMut};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};

use crate::error::CollectorError;

/// 프레이밍 방식
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Framing {
    /// 개행 문자로 레코드 구분
    #[default]
    NewlineDelimited,
    /// 4바이트 big-endian 길이 접두사
    LengthPrefixed,
}

impl FromStr for Framing {
    type Err = CollectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "newline" => Ok(Self::NewlineDelimited),
            "length_prefixed" => Ok(Self::LengthPrefixed),
            other => Err(CollectorError::Config {
                field: "socket.framing".to_owned(),
                reason: format!("unknown framing '{other}'"),
            }),
        }
    }
}

impl fmt::Display for Framing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NewlineDelimited => f.write_str("newline"),
            Self::LengthPrefixed => f.write_str("length_prefixed"),
        }
    }
}

impl Framing {
    /// 페이로드를 프레임으로 감쌉니다.
    ///
    /// 개행 프레이밍의 페이로드는 개행 문자를 포함하면 안 됩니다.
    pub fn encode(self, payload: &[u8]) -> Bytes {
        let mut buf = BytesMut::with_capacity(payload.len() + 4);
        match self {
            Self::NewlineDelimited => {
                buf.put_slice(payload);
                buf.put_u8(b'\n');
            }
            Self::LengthPrefixed => {
                // u32 범위를 넘는 페이로드는 max_message_size에 걸림
                buf.put_u32(u32::try_from(payload.len()).unwrap_or(u32::MAX));
                buf.put_slice(payload);
            }
        }
        buf.freeze()
    }
}

/// 비동기 스트림에서 프레임을 순서대로 읽습니다.
pub struct FrameReader<R> {
    reader: BufReader<R>,
    framing: Framing,
    max_len: usize,
    line: Vec<u8>,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    /// 새 프레임 리더를 생성합니다.
    pub fn new(inner: R, framing: Framing, max_len: usize) -> Self {
        Self {
            reader: BufReader::new(inner),
            framing,
            max_len,
            line: Vec::new(),
        }
    }

    /// 다음 프레임을 읽습니다.
    ///
    /// 프레임 경계에서 스트림이 끝나면 `Ok(None)`을 반환합니다.
    pub async fn next_frame(&mut self) -> Result<Option<Bytes>, CollectorError> {
        match self.framing {
            Framing::NewlineDelimited => self.next_line().await,
            Framing::LengthPrefixed => self.next_prefixed().await,
        }
    }

    async fn next_line(&mut self) -> Result<Option<Bytes>, CollectorError> {
        // 최대 크기 + 개행 1바이트
        let limit = self.max_len as u64 + 1;

        loop {
            self.line.clear();
            let read = (&mut self.reader)
                .take(limit)
                .read_until(b'\n', &mut self.line)
                .await?;
            if read == 0 {
                return Ok(None);
            }

            if self.line.last() == Some(&b'\n') {
                self.line.pop();
                if self.line.last() == Some(&b'\r') {
                    self.line.pop();
                }
            } else if read as u64 == limit {
                return Err(CollectorError::FrameTooLarge {
                    size: read,
                    limit: self.max_len,
                });
            }
            // 개행 없이 EOF에 도달한 마지막 레코드도 프레임으로 취급

            if self.line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            return Ok(Some(Bytes::copy_from_slice(&self.line)));
        }
    }

    async fn next_prefixed(&mut self) -> Result<Option<Bytes>, CollectorError> {
        if self.reader.fill_buf().await?.is_empty() {
            return Ok(None);
        }

        let len = self.reader.read_u32().await? as usize;
        if len > self.max_len {
            return Err(CollectorError::FrameTooLarge {
                size: len,
                limit: self.max_len,
            });
        }

        let mut frame = BytesMut::zeroed(len);
        self.reader.read_exact(&mut frame).await?;
        Ok(Some(frame.freeze()))
    }
}
