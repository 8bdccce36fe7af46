use std::fmt::Write;

use crate::models::ChatSession;

pub fn to_markdown(session: &ChatSession) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "# {}\n", session.title());
    if let Some(url) = session.url() {
        let _ = writeln!(out, "**Source**: {url}  ");
    }
    if let Some(created) = session.created_time() {
        let _ = writeln!(out, "**Created**: {}  ", created.format("%Y-%m-%d %H:%M:%S UTC"));
    }
    let _ = writeln!(out, "**Messages**: {}\n", session.turns().len());
    out.push_str("---\n\n");

    for (index, turn) in session.turns().iter().enumerate() {
        let _ = writeln!(
            out,
            "## {}. {} {}\n",
            index + 1,
            turn.sender.marker(),
            turn.sender.display_name()
        );

        if let Some(thinking) = &turn.thinking {
            out.push_str("<details>\n<summary>Thinking</summary>\n\n");
            let _ = writeln!(out, "{}\n", quote(thinking));
            out.push_str("</details>\n\n");
        }

        let _ = writeln!(out, "{}\n", turn.content);
        out.push_str("---\n\n");
    }

    out
}

fn quote(text: &str) -> String {
    text.lines()
        .map(|line| {
            if line.is_empty() {
                ">".to_string()
            } else {
                format!("> {line}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}
