use colored::Colorize;

/// Print an info message
pub fn info(msg: &str) {
    println!("{} {}", "ℹ".blue(), msg);
}

/// Print a success message
pub fn success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

/// Print a warning message
pub fn warn(msg: &str) {
    println!("{} {}", "⚠".yellow(), msg);
}

/// Print an error message
pub fn error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

/// Print a dim/muted message
pub fn dim(msg: &str) {
    println!("  {}", msg.dimmed());
}

/// Print a dim/muted message to stderr
pub fn dim_err(msg: &str) {
    eprintln!("  {}", msg.dimmed());
}

/// Print a header/title
pub fn header(title: &str) {
    println!();
    println!("{}", title.bold());
    println!("{}", "─".repeat(title.chars().count()).dimmed());
}

/// Print a section header
pub fn section(title: &str) {
    println!();
    println!("{}", title.cyan().bold());
}

/// Print a key-value pair
pub fn kv(key: &str, value: &str) {
    println!("  {}: {}", key.dimmed(), value);
}

/// Render a node as `ip:port`, marking disabled nodes
pub fn node(node: &lbkit::Node) -> String {
    match node.status {
        lbkit::Status::Enabled => format!("{}:{}", node.ip_address, node.private_port),
        lbkit::Status::Disabled => format!(
            "{}:{} {}",
            node.ip_address,
            node.private_port,
            "(disabled)".yellow()
        ),
    }
}

/// Render a list of nodes on one line
pub fn node_list(nodes: &[lbkit::Node]) -> String {
    if nodes.is_empty() {
        return "none".dimmed().to_string();
    }
    nodes.iter().map(node).collect::<Vec<_>>().join(", ")
}

// ============================================================================
// Tests
// ============================================================================
