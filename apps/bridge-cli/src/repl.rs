use anyhow::Result;
use bridge_protocol::Exchange;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tool_server::{ToolServer, TOOLS};
use tracing::warn;

fn print_help() {
    println!("Tools (arguments as a JSON object, e.g. move_relative {{\"forward\": 1.0}}):");
    for tool in TOOLS {
        if tool.params.is_empty() {
            println!("  {:<24} {}", tool.name, tool.description);
        } else {
            println!(
                "  {:<24} {} [{}]",
                tool.name,
                tool.description,
                tool.params.join(", ")
            );
        }
    }
    println!("  help | exit");
}

/// Split `tool {json}` into the tool name and its arguments.
fn parse_line(line: &str) -> Result<(&str, Value)> {
    let line = line.trim();
    let (tool, rest) = match line.split_once(char::is_whitespace) {
        Some((tool, rest)) => (tool, rest.trim()),
        None => (line, ""),
    };
    let args = if rest.is_empty() {
        Value::Null
    } else {
        serde_json::from_str(rest)?
    };
    Ok((tool, args))
}

pub async fn run<E: Exchange>(server: ToolServer<E>) -> Result<()> {
    println!(
        "simbridge tool prompt for {} (type 'help')",
        server.config().robot_name
    );
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let (tool, args) = match parse_line(&line) {
            Ok(parsed) => parsed,
            Err(e) => {
                println!("invalid arguments: {e}");
                continue;
            }
        };
        match tool {
            "" => continue,
            "exit" | "quit" => break,
            "help" => print_help(),
            _ => match server.call(tool, args).await {
                Ok(reply) => println!("{}", serde_json::to_string_pretty(&reply)?),
                Err(e) => {
                    warn!(tool, error = %e, "tool call failed");
                    println!("error: {e}");
                }
            },
        }
    }
    Ok(())
}
