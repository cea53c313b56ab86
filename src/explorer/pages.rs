//! HTML rendering for the explorer

use crate::core::Block;

const TITLE: &str = "chainport explorer";

/// Escape text for use in element content and quoted attributes
fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Wrap `content` in the shared page chrome
fn layout(page: &str, content: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <title>{page} | {title}</title>
  <link rel="stylesheet" href="/static/style.css">
</head>
<body>
  <header>
    <nav>
      <strong>{title}</strong>
      <a href="/">Home</a>
      <a href="/add">Add Block</a>
    </nav>
  </header>
  <main>
    <h1>{page}</h1>
{content}
  </main>
  <footer>&copy; {year} chainport</footer>
</body>
</html>
"#,
        page = page,
        title = TITLE,
        content = content,
        year = chrono::Utc::now().format("%Y"),
    )
}

fn block_card(block: &Block) -> String {
    format!(
        r#"    <section class="block">
      <dl>
        <dt>Height</dt><dd>{height}</dd>
        <dt>Hash</dt><dd>{hash}</dd>
        <dt>Previous Hash</dt><dd>{prev_hash}</dd>
        <dt>Difficulty</dt><dd>{difficulty}</dd>
        <dt>Nonce</dt><dd>{nonce}</dd>
        <dt>Timestamp</dt><dd>{timestamp}</dd>
        <dt>Transactions</dt><dd>{tx_count}</dd>
      </dl>
    </section>
"#,
        height = block.height,
        hash = escape(&block.hash),
        prev_hash = escape(&block.prev_hash),
        difficulty = block.difficulty,
        nonce = block.nonce,
        timestamp = escape(&block.timestamp.to_rfc3339()),
        tx_count = block.tx_count(),
    )
}

/// Block list, in the order given
pub fn home(blocks: &[Block]) -> String {
    let content: String = blocks.iter().map(block_card).collect();
    layout("Home", &content)
}

pub fn add_block() -> String {
    layout(
        "Add Block",
        r#"    <form method="POST" action="/add">
      <p>Mine a new block from the pending transactions.</p>
      <button type="submit">Add Block</button>
    </form>
"#,
    )
}

pub fn error(message: &str) -> String {
    layout(
        "Error",
        &format!("    <p class=\"error\">{}</p>\n", escape(message)),
    )
}
