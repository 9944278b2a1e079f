//! Interactive shell: reads statements from stdin and pages through their
//! results.

use tokio::io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, info};

use crate::cli::OutputFormat;
use crate::db::Driver;
use crate::error::{PagerError, Result};
use crate::output::{self, Navigation};
use crate::query::{Paginator, Query};

const HELP: &str = "\
Statements end with ';' at the end of a line.
  \\n  next page
  \\p  previous page
  \\r  run the statement again
  \\u  show the connection
  \\q  quit";

/// A backslash command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellCommand {
    Next,
    Prev,
    Rerun,
    Url,
    Quit,
    Help,
    Unknown(String),
}

impl ShellCommand {
    /// Parses a line starting with a backslash; other lines are not commands.
    pub fn parse(line: &str) -> Option<Self> {
        let word = line.trim().strip_prefix('\\')?;
        Some(match word.split_whitespace().next().unwrap_or("") {
            "n" => Self::Next,
            "p" => Self::Prev,
            "r" => Self::Rerun,
            "u" => Self::Url,
            "q" => Self::Quit,
            "h" | "?" => Self::Help,
            other => Self::Unknown(other.to_string()),
        })
    }
}

/// Collects input lines until a statement is complete.
#[derive(Debug, Default)]
pub struct StatementBuffer {
    text: String,
}

impl StatementBuffer {
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }

    /// Adds a line; returns the statement text once a line ends with `;`.
    pub fn push_line(&mut self, line: &str) -> Option<String> {
        self.text.push_str(line);
        self.text.push('\n');

        if line.trim_end().ends_with(';') {
            Some(std::mem::take(&mut self.text))
        } else {
            None
        }
    }
}

/// Runs the shell until `\q` or end of input.
pub async fn run(driver: &dyn Driver, page_size: usize, format: OutputFormat) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    let mut buffer = StatementBuffer::default();
    let mut pager: Option<Paginator<'_>> = None;

    info!("Interactive shell on {}", driver.url());
    write(&mut stdout, &format!("Connected to {}. \\h for help.\n", driver.url())).await?;

    loop {
        let prompt = if buffer.is_empty() { "db-pager> " } else { "     ...> " };
        write(&mut stdout, prompt).await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };

        if buffer.is_empty() {
            if let Some(command) = ShellCommand::parse(&line) {
                debug!("Shell command {command:?}");
                let reply = match &command {
                    ShellCommand::Quit => break,
                    ShellCommand::Help => HELP.to_string(),
                    ShellCommand::Url => driver.url(),
                    ShellCommand::Unknown(name) => format!("Unknown command \\{name}. \\h for help."),
                    ShellCommand::Next | ShellCommand::Prev | ShellCommand::Rerun => {
                        match pager.as_mut() {
                            Some(pager) => navigate(pager, &command, format).await,
                            None => "No statement has been run yet.".to_string(),
                        }
                    }
                };
                write(&mut stdout, &format!("{reply}\n")).await?;
                continue;
            }
        }

        let Some(sql) = buffer.push_line(&line) else {
            continue;
        };

        if let Some(previous) = pager.take() {
            previous.close().await;
        }

        let reply = match Query::new(driver, &sql) {
            Ok(mut query) => {
                query.execute().await;
                let current = pager.insert(Paginator::with_page_size(query, page_size));
                current.next_page().await;
                render(current, format)
            }
            Err(e) => describe_error(&e),
        };
        write(&mut stdout, &format!("{reply}\n")).await?;
    }

    if let Some(pager) = pager {
        pager.close().await;
    }
    Ok(())
}

async fn navigate(pager: &mut Paginator<'_>, command: &ShellCommand, format: OutputFormat) -> String {
    match command {
        ShellCommand::Next => {
            pager.next_page().await;
        }
        ShellCommand::Prev => {
            if let Err(e) = pager.prev_page().await {
                return describe_error(&e);
            }
        }
        ShellCommand::Rerun => {
            pager.rerun().await;
            pager.next_page().await;
        }
        _ => {}
    }
    render(pager, format)
}

/// Renders the paginator's current page.
pub fn render(pager: &Paginator<'_>, format: OutputFormat) -> String {
    output::render_page(
        format,
        &pager.keys(),
        pager.current(),
        Navigation {
            has_prev: pager.has_prev(),
            has_next: pager.has_next(),
        },
    )
}

fn describe_error(error: &PagerError) -> String {
    format!("{}: {}", error.category(), error)
}

async fn write<W: AsyncWrite + Unpin>(out: &mut W, text: &str) -> Result<()> {
    out.write_all(text.as_bytes()).await?;
    out.flush().await?;
    Ok(())
}
