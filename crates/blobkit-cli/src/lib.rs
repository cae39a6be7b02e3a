use anyhow::{anyhow, Context};

/// Truncate a string to max_len characters, appending "..." if truncated.
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Parse an inclusive byte range written as `BEGIN-END`.
pub fn parse_range(s: &str) -> anyhow::Result<(u64, u64)> {
    let (begin, end) = s
        .split_once('-')
        .ok_or_else(|| anyhow!("range must look like BEGIN-END, got {:?}", s))?;
    let begin: u64 = begin
        .trim()
        .parse()
        .with_context(|| format!("invalid range start {:?}", begin))?;
    let end: u64 = end
        .trim()
        .parse()
        .with_context(|| format!("invalid range end {:?}", end))?;
    if end < begin {
        return Err(anyhow!("range end {} is before start {}", end, begin));
    }
    Ok((begin, end))
}

/// Whether a file of `len` bytes goes through the multi-part upload.
pub fn needs_large_upload(len: u64, part_size: usize) -> bool {
    len > part_size as u64
}

/// Initialize tracing for the CLI binary.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}
