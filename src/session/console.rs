//! Interactive command loop on stdin: `on`, `off`, `break <minutes>`,
//! `task <text>`, `status`, `exit`.

use anyhow::Result;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use super::{
    controller::{ModeRequest, SessionController, SessionSnapshot},
    state::SessionMode,
};

const HELP: &str = "commands: on | off | break <minutes> | task <text> | status | exit";
const PHRASE_PROMPT: &str = "Type the confirmation phrase to continue:";

enum Command {
    Mode(SessionMode, Option<f64>),
    Task(String),
    Status,
    Exit,
    Help,
    Invalid(String),
}

fn parse(line: &str) -> Command {
    let line = line.trim();
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };

    match word.to_ascii_lowercase().as_str() {
        "on" => Command::Mode(SessionMode::On, None),
        "off" => Command::Mode(SessionMode::Off, None),
        "break" if rest.is_empty() => Command::Mode(SessionMode::Break, None),
        "break" => match rest.parse::<f64>() {
            Ok(minutes) => Command::Mode(SessionMode::Break, Some(minutes)),
            Err(_) => Command::Invalid(format!("not a number of minutes: {rest}")),
        },
        "task" => Command::Task(rest.to_string()),
        "status" => Command::Status,
        "exit" | "quit" => Command::Exit,
        "" | "help" => Command::Help,
        other => Command::Invalid(format!("unknown command: {other}")),
    }
}

fn describe(snapshot: &SessionSnapshot) -> String {
    let mut line = format!("mode: {} | task: {}", snapshot.mode, snapshot.task);
    if let Some(ms) = snapshot.break_remaining_ms {
        line.push_str(&format!(" | break ends in {}s", ms / 1000));
    }
    if let Some(record) = &snapshot.last_verdict {
        let verdict = if record.verdict.productive {
            "productive"
        } else {
            "not productive"
        };
        line.push_str(&format!(" | last verdict: {verdict}"));
    }
    if let Some(err) = snapshot.last_error.as_ref().or(snapshot.monitor_error.as_ref()) {
        line.push_str(&format!(" | error: {err}"));
    }
    line
}

/// Runs until `exit` or end of input.
pub async fn run_console<R, W>(controller: SessionController, reader: R, mut writer: W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();
    writer.write_all(format!("{HELP}\n").as_bytes()).await?;
    writer.flush().await?;

    while let Some(line) = lines.next_line().await? {
        let reply = match parse(&line) {
            Command::Exit => break,
            Command::Help => HELP.to_string(),
            Command::Invalid(message) => format!("{message}\n{HELP}"),
            Command::Status => describe(&controller.snapshot().await),
            Command::Task(task) => describe(&controller.set_task(&task).await),
            Command::Mode(mode, minutes) => {
                let mut request = ModeRequest::new(mode);
                request.minutes = minutes;

                let current = controller.snapshot().await.mode;
                if mode != SessionMode::On && current != SessionMode::Off {
                    writer.write_all(format!("{PHRASE_PROMPT}\n").as_bytes()).await?;
                    writer.flush().await?;
                    request.confirmation = lines.next_line().await?;
                }

                match controller.set_mode(request).await {
                    Ok(snapshot) => describe(&snapshot),
                    Err(err) => format!("error: {err}"),
                }
            }
        };

        writer.write_all(format!("{reply}\n").as_bytes()).await?;
        writer.flush().await?;
    }

    Ok(())
}
