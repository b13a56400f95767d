//! Fence-aware message chunker for Discord's 2000-character limit.
//!
//! Never splits inside a code block if it can help it; when forced to, the
//! open fence is closed and reopened in the next chunk. GFM pipe-tables are
//! wrapped in fences before chunking so split tables keep their monospace
//! alignment in every chunk.

pub const DISCORD_MAX_CHARS: usize = 2000;
/// Leave room for fence reopening overhead.
pub const EFFECTIVE_MAX: usize = DISCORD_MAX_CHARS - 50;

/// Split a message into Discord-safe chunks.
///
/// Rules:
/// 1. Wrap GFM pipe-tables in code fences
/// 2. Prefer splitting at paragraph boundaries (blank lines)
/// 3. Never split inside a code fence if possible
/// 4. If forced to split inside a fence, close it and reopen in the next chunk
pub fn chunk_message(text: &str) -> Vec<String> {
    chunk_message_with_limit(text, EFFECTIVE_MAX)
}

/// [`chunk_message`] with an explicit per-chunk limit.
pub fn chunk_message_with_limit(text: &str, max_chars: usize) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }

    let text = wrap_tables_in_fences(text);

    if text.len() <= max_chars {
        return vec![text];
    }

    let mut chunks: Vec<String> = Vec::new();
    let mut remaining = text;

    while !remaining.is_empty() {
        if remaining.len() <= max_chars {
            chunks.push(remaining);
            break;
        }

        let split_at = find_split_point(&remaining, max_chars);
        let chunk = remaining[..split_at].trim_end().to_string();
        remaining = remaining[split_at..].trim_start_matches('\n').to_string();

        let (chunk, fence_lang) = close_open_fence(chunk);
        chunks.push(chunk);

        if let Some(lang) = fence_lang {
            remaining = format!("```{lang}\n{remaining}");
        }
    }

    chunks.retain(|c| !c.trim().is_empty());
    chunks
}

/// Wrap every GFM pipe-table block in a triple-backtick code fence.
///
/// Discord renders tables natively only when the whole table fits in one
/// message; continuation chunks would show raw pipes. Fenced tables go
/// through the fence-aware splitter instead. Tables already inside a fence
/// are left untouched.
fn wrap_tables_in_fences(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut in_fence = false;
    let mut in_table = false;

    for line in text.split_inclusive('\n') {
        let stripped = line.trim_end_matches(['\n', '\r']);

        if stripped.trim().starts_with("```") {
            if in_table {
                ensure_newline(&mut result);
                result.push_str("```\n");
                in_table = false;
            }
            in_fence = !in_fence;
            result.push_str(line);
            continue;
        }

        if in_fence {
            result.push_str(line);
            continue;
        }

        let is_table = is_table_line(stripped);
        if is_table && !in_table {
            result.push_str("```\n");
            in_table = true;
        } else if !is_table && in_table {
            ensure_newline(&mut result);
            result.push_str("```\n");
            in_table = false;
        }

        result.push_str(line);
    }

    if in_table {
        ensure_newline(&mut result);
        result.push_str("```\n");
    }

    result
}

fn ensure_newline(text: &mut String) {
    if !text.is_empty() && !text.ends_with('\n') {
        text.push('\n');
    }
}

/// A table row starts and ends with a pipe (after trimming) and has at
/// least one character between the pipes.
fn is_table_line(line: &str) -> bool {
    let stripped = line.trim();
    stripped.len() >= 3 && stripped.starts_with('|') && stripped.ends_with('|')
}

/// Find the best split position: a paragraph break, then any line break,
/// then a hard split at the limit.
fn find_split_point(text: &str, max_chars: usize) -> usize {
    let limit = floor_char_boundary(text, max_chars);
    let search_region = &text[..limit];

    if let Some(pos) = search_region.rfind("\n\n")
        && pos > max_chars / 3
    {
        return pos + 1;
    }

    match search_region.rfind('\n') {
        Some(pos) if pos > max_chars / 3 => pos + 1,
        _ => limit,
    }
}

fn floor_char_boundary(text: &str, mut index: usize) -> usize {
    if index >= text.len() {
        return text.len();
    }
    while !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}

/// If the chunk has an unclosed code fence, close it.
///
/// Returns the (possibly modified) chunk and the open fence language:
/// `None` when no fence was open, `Some("")` for a bare fence.
fn close_open_fence(chunk: String) -> (String, Option<String>) {
    let mut fence_count = 0usize;
    let mut fence_lang = String::new();

    for line in chunk.split('\n') {
        let stripped = line.trim();
        if stripped.starts_with("```") {
            if fence_count % 2 == 0 {
                fence_lang = stripped[3..].trim().to_string();
            }
            fence_count += 1;
        }
    }

    if fence_count % 2 == 1 {
        (format!("{chunk}\n```"), Some(fence_lang))
    } else {
        (chunk, None)
    }
}
