//! Bidirectional relay for upgraded connections.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::resilience::timeouts::{ActivityClock, Elapsed};

const PUMP_BUFFER: usize = 16 * 1024;

/// Bytes moved by [`pump`] in each direction.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PumpTotals {
    pub a_to_b: u64,
    pub b_to_a: u64,
}

/// Copy bytes both ways until both sides have closed or neither side has
/// moved a byte for `idle`.
///
/// When one side stops sending, the write half towards the other side is
/// shut down and the opposite direction keeps flowing.
pub async fn pump<A, B>(a: &mut A, b: &mut B, idle: Duration) -> Result<PumpTotals, PumpError>
where
    A: AsyncRead + AsyncWrite + Unpin,
    B: AsyncRead + AsyncWrite + Unpin,
{
    let clock = ActivityClock::new();
    let a_to_b = AtomicU64::new(0);
    let b_to_a = AtomicU64::new(0);

    let (mut a_read, mut a_write) = tokio::io::split(a);
    let (mut b_read, mut b_write) = tokio::io::split(b);

    let result = tokio::select! {
        res = async {
            tokio::try_join!(
                copy_half(&mut a_read, &mut b_write, &clock, &a_to_b),
                copy_half(&mut b_read, &mut a_write, &clock, &b_to_a),
            )
        } => res.map(|_| ()).map_err(PumpError::Io),
        elapsed = idle_watchdog(&clock, idle) => Err(PumpError::Idle(elapsed)),
    };

    let _ = b_write.shutdown().await;
    let _ = a_write.shutdown().await;

    result.map(|()| PumpTotals {
        a_to_b: a_to_b.load(Ordering::Relaxed),
        b_to_a: b_to_a.load(Ordering::Relaxed),
    })
}

#[derive(Debug, thiserror::Error)]
pub enum PumpError {
    #[error(transparent)]
    Idle(Elapsed),

    #[error(transparent)]
    Io(std::io::Error),
}

async fn copy_half<R, W>(
    reader: &mut R,
    writer: &mut W,
    clock: &ActivityClock,
    total: &AtomicU64,
) -> std::io::Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; PUMP_BUFFER];
    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            return writer.shutdown().await;
        }
        clock.touch();
        writer.write_all(&buf[..n]).await?;
        writer.flush().await?;
        clock.touch();
        total.fetch_add(n as u64, Ordering::Relaxed);
    }
}

async fn idle_watchdog(clock: &ActivityClock, idle: Duration) -> Elapsed {
    loop {
        let quiet = clock.idle_for();
        if quiet >= idle {
            return Elapsed {
                operation: "upgraded relay",
                limit: idle,
            };
        }
        tokio::time::sleep(idle - quiet).await;
    }
}
