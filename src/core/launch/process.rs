// ─── Child Process Output ───
// Forwards a child's stdout and stderr into the task log, line by line.

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Child;
use tokio::task::JoinHandle;

use super::message::MessageLevel;
use super::step::StepContext;

/// Spawn readers for the piped output of `child`. They outlive the step that started them.
pub(crate) fn forward_output(child: &mut Child, ctx: &StepContext) -> Vec<JoinHandle<()>> {
    let mut readers = Vec::new();
    if let Some(stdout) = child.stdout.take() {
        readers.push(spawn_reader(stdout, ctx.clone(), MessageLevel::StdOut));
    }
    if let Some(stderr) = child.stderr.take() {
        readers.push(spawn_reader(stderr, ctx.clone(), MessageLevel::StdErr));
    }
    readers
}

fn spawn_reader<R>(reader: R, ctx: StepContext, level: MessageLevel) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            ctx.log(line, level);
        }
    })
}

/// Quote an argument for display in a copy-pasteable command line.
pub(crate) fn shell_escape(raw: &str) -> String {
    if raw.is_empty() {
        return "\"\"".to_string();
    }

    if raw.chars().all(|ch| {
        ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.' | '/' | ':' | '\\' | '=')
    }) {
        return raw.to_string();
    }

    format!("\"{}\"", raw.replace('"', "\\\""))
}

pub(crate) fn format_command_for_logs(program: &str, args: &[String]) -> String {
    std::iter::once(program)
        .chain(args.iter().map(String::as_str))
        .map(shell_escape)
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_only_when_needed() {
        assert_eq!(shell_escape("-Xmx2048M"), "-Xmx2048M");
        assert_eq!(shell_escape("a b"), "\"a b\"");
        assert_eq!(shell_escape(""), "\"\"");
        assert_eq!(
            format_command_for_logs("java", &["-cp".to_string(), "my dir/a.jar".to_string()]),
            "java -cp \"my dir/a.jar\""
        );
    }
}
