use snapdoc_graph::ModuleKey;

/// Parse `--max-workers`; at least one worker is required.
pub fn parse_max_workers(s: &str) -> Result<usize, String> {
    let workers: usize = s
        .parse()
        .map_err(|_| format!("Expected a positive number of workers, got '{}'", s))?;
    if workers == 0 {
        return Err("At least one worker is required".to_string());
    }
    Ok(workers)
}

/// Parse a module key argument, normalizing path separators.
pub fn parse_module_key(s: &str) -> Result<String, String> {
    ModuleKey::new(s)
        .map(|key| key.as_str().to_string())
        .map_err(|e| e.to_string())
}
