//! Path helpers and the ASCII/binary type decision table

use crate::state::TransferType;

/// Extensions transferred as ASCII; everything else goes as image (binary)
const ASCII_EXTENSIONS: &[&str] = &[
	"ajx", "am", "asa", "asc", "asp", "aspx", "awk", "bat", "c", "cdf", "cf", "cfg", "cfm", "cgi", "cnf",
	"conf", "cpp", "css", "csv", "ctl", "dat", "dhtml", "diz", "file", "forward", "grp", "h", "hpp", "hqx",
	"hta", "htaccess", "htc", "htm", "html", "htpasswd", "htt", "htx", "in", "inc", "info", "ini", "ink",
	"java", "js", "jsp", "log", "logfile", "m3u", "m4", "mak", "map", "md", "model", "msg", "nfo", "nsi",
	"old", "pas", "patch", "perl", "php", "php2", "php3", "php4", "php5", "php6", "phtml", "pix", "pl", "pm",
	"po", "pwd", "py", "qmail", "rb", "rbl", "rbw", "readme", "reg", "rs", "rss", "rtf", "ruby", "session",
	"setup", "sh", "shtm", "shtml", "sql", "ssh", "stm", "style", "svg", "tcl", "text", "threads", "tmpl",
	"toml", "tpl", "txt", "ubb", "vbs", "xhtml", "xml", "xrc", "xsl", "yaml", "yml",
];

/// Last path component (empty for a trailing slash)
pub fn file_name(path: &str) -> &str {
	path.rsplit('/').next().unwrap_or(path)
}

/// Extension of the last path component, lowercase, without the dot.
///
/// A leading dot (`.htaccess`) counts as an extension of a nameless file.
pub fn extension(path: &str) -> Option<String> {
	let name = file_name(path);
	name.rfind('.').map(|i| name[i + 1..].to_ascii_lowercase())
}

/// Pick the representation type for a remote file.
///
/// No path, no file name, or a dot file with nothing before the dot is
/// treated as text, as is any extension in the ASCII table.
pub fn decide_transfer_type(path: Option<&str>) -> TransferType {
	let name = match path.map(file_name) {
		Some(name) if !name.is_empty() => name,
		_ => return TransferType::Ascii,
	};
	if name.rfind('.') == Some(0) {
		return TransferType::Ascii;
	}
	match extension(name) {
		Some(ext) if ASCII_EXTENSIONS.contains(&ext.as_str()) => TransferType::Ascii,
		_ => TransferType::Image,
	}
}

/// Resolve `path` against the remote working directory
pub fn join_path(base: &str, path: &str) -> String {
	if path.starts_with('/') || base.is_empty() {
		return path.to_string();
	}
	if base.ends_with('/') {
		format!("{}{}", base, path)
	} else {
		format!("{}/{}", base, path)
	}
}

/// Extract the quoted path of a 257 reply; `""` inside quotes is a literal quote
pub fn parse_quoted_path(text: &str) -> Option<String> {
	let start = text.find('"')?;
	let mut chars = text[start + 1..].chars().peekable();
	let mut path = String::new();
	while let Some(c) = chars.next() {
		if c == '"' {
			if chars.peek() == Some(&'"') {
				chars.next();
				path.push('"');
				continue;
			}
			return Some(path);
		}
		path.push(c);
	}
	None
}

/// Split `host[:port]`, falling back to `default_port`
pub fn split_host_port(target: &str, default_port: u16) -> (String, u16) {
	match target.rsplit_once(':') {
		Some((host, port)) if !host.contains(':') => match port.parse() {
			Ok(port) => (host.to_string(), port),
			Err(_) => (target.to_string(), default_port),
		},
		_ => (target.to_string(), default_port),
	}
}


// vim: ts=4
