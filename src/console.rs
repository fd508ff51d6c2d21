//! Interactive console session
//!
//! One line per turn. `bye` or end of input ends the session.

use crate::conversation::{Conversation, GENERIC_FAILURE};
use crate::Result;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{info, warn};

pub const EXIT_SENTINEL: &str = "bye";

pub async fn run<R, W>(conversation: &mut Conversation, input: R, mut output: W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let session_id = conversation.session_id();
    let mut lines = input.lines();

    info!(%session_id, "Console session started");

    loop {
        output.write_all(b"User: ").await?;
        output.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };

        let question = line.trim();
        if question == EXIT_SENTINEL {
            break;
        }
        if question.is_empty() {
            continue;
        }

        let reply = match conversation.respond(question).await {
            Ok(answer) => answer,
            Err(e) => {
                warn!(%session_id, error = %e, "Turn failed");
                GENERIC_FAILURE.to_string()
            }
        };

        output
            .write_all(format!("Assistant: {}\n", reply).as_bytes())
            .await?;
    }

    output.flush().await?;
    info!(%session_id, "Console session ended");

    Ok(())
}
