//! Line-oriented converter for the restricted Markdown dialect used by body documents.
//!
//! Supported: `#`/`##`/`###` headings, fenced code blocks, flat `-`/`*` bullet
//! lists and blank-line breaks. Everything else becomes a paragraph.

pub const PARAGRAPH_BREAK: &str = "<div class='sp'></div>";

pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

fn is_fence(line: &str) -> bool {
    let Some(rest) = line.strip_prefix("```") else {
        return false;
    };
    rest.trim_end()
        .chars()
        .all(|ch| ch.is_alphanumeric() || ch == '_')
}

fn bullet_text(line: &str) -> Option<&str> {
    let rest = line.trim_start();
    let rest = rest.strip_prefix(['-', '*'])?;
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }
    Some(rest.trim_start())
}

fn heading(line: &str) -> Option<(u8, &str)> {
    if let Some(text) = line.strip_prefix("### ") {
        Some((3, text))
    } else if let Some(text) = line.strip_prefix("## ") {
        Some((2, text))
    } else {
        line.strip_prefix("# ").map(|text| (1, text))
    }
}

#[derive(Default)]
struct Transducer {
    out: Vec<String>,
    in_code: bool,
    list_open: bool,
}

impl Transducer {
    fn close_list(&mut self) {
        if self.list_open {
            self.out.push("</ul>".to_string());
            self.list_open = false;
        }
    }

    fn feed(&mut self, line: &str) {
        if is_fence(line) {
            if self.in_code {
                self.in_code = false;
                self.out.push("</code></pre>".to_string());
            } else {
                self.close_list();
                self.in_code = true;
                self.out.push("<pre><code>".to_string());
            }
            return;
        }

        if self.in_code {
            self.out.push(escape_html(line));
            return;
        }

        if let Some((level, text)) = heading(line) {
            self.close_list();
            self.out
                .push(format!("<h{level}>{}</h{level}>", escape_html(text)));
            return;
        }

        if let Some(text) = bullet_text(line) {
            if !self.list_open {
                self.out.push("<ul>".to_string());
                self.list_open = true;
            }
            self.out.push(format!("<li>{}</li>", escape_html(text)));
            return;
        }

        self.close_list();
        if line.trim().is_empty() {
            self.out.push(PARAGRAPH_BREAK.to_string());
        } else {
            self.out.push(format!("<p>{}</p>", escape_html(line)));
        }
    }

    fn finish(mut self) -> String {
        self.close_list();
        if self.in_code {
            self.out.push("</code></pre>".to_string());
        }
        self.out.join("\n")
    }
}

pub fn md_to_html(markdown: &str) -> String {
    let normalized = markdown.replace("\r\n", "\n").replace('\r', "\n");
    let mut transducer = Transducer::default();
    for line in normalized.split('\n') {
        transducer.feed(line);
    }
    transducer.finish()
}
