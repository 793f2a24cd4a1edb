//! HTML shells for the fixed set of site pages.

use std::path::{Path, PathBuf};

use log::info;
use shared::{PageConfig, TREE_PAGE_ID, TreeNode};

use crate::error::SiteError;
use crate::markdown::escape_html;
use crate::textio::write_text_utf8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NavPage {
    pub id: &'static str,
    pub label: &'static str,
    pub file: &'static str,
}

pub const NAV_PAGES: [NavPage; 7] = [
    NavPage { id: "top", label: "TOP", file: "index.html" },
    NavPage { id: "products", label: "製品", file: "products.html" },
    NavPage { id: "services", label: "サービス", file: "services.html" },
    NavPage { id: TREE_PAGE_ID, label: "基準一覧", file: "rules.html" },
    NavPage { id: "search", label: "検索", file: "search.html" },
    NavPage { id: "wiki", label: "wiki", file: "wiki.html" },
    NavPage { id: "howto", label: "How to", file: "howto.html" },
];

/// Site-wide values shared by every page.
#[derive(Debug, Clone)]
pub struct SiteChrome {
    pub title: String,
    pub lang: String,
    pub build_base_url: String,
    /// File name under `assets/` when an icon was copied.
    pub icon: Option<String>,
}

pub fn escape_attr(text: &str) -> String {
    escape_html(text).replace('"', "&quot;")
}

/// Makes serialized JSON safe to embed inside a `<script>` element.
///
/// `<`, `>` and `&` only occur inside JSON strings, so their `\u` escapes keep
/// the value intact while no markup (`</script>`, `<!--`) survives. U+2028 and
/// U+2029 are escaped as well.
pub fn escape_script_json(json: &str) -> String {
    let mut out = String::with_capacity(json.len());
    for ch in json.chars() {
        match ch {
            '<' => out.push_str("\\u003c"),
            '>' => out.push_str("\\u003e"),
            '&' => out.push_str("\\u0026"),
            '\u{2028}' => out.push_str("\\u2028"),
            '\u{2029}' => out.push_str("\\u2029"),
            _ => out.push(ch),
        }
    }
    out
}

pub fn build_nav_html(active_id: &str) -> String {
    NAV_PAGES
        .iter()
        .map(|page| {
            let class = if page.id == active_id { "tab is-active" } else { "tab" };
            format!(
                r#"<a class="{class}" href="./{}" data-nav="{}">{}</a>"#,
                escape_attr(page.file),
                escape_attr(page.id),
                escape_html(page.label)
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn boot_script(config: &PageConfig, tree: Option<&[TreeNode]>) -> Result<String, SiteError> {
    let config_json = serde_json::to_string(config)?;
    let tree_json = match tree {
        Some(forest) => serde_json::to_string(forest)?,
        None => "[]".to_string(),
    };
    Ok(format!(
        "<script>\nRuleNavi.boot({{ config: {}, tree: {} }});\n</script>",
        escape_script_json(&config_json),
        escape_script_json(&tree_json)
    ))
}

/// Top-level rows as the controller first draws them: nothing open, no filter.
pub fn render_initial_rows(forest: &[TreeNode]) -> String {
    let mut html = String::from("<div id=\"tree\">\n");
    for node in forest {
        let class = if node.has_body { "node" } else { "node no-body" };
        let twisty = if node.has_children() { "▸" } else { "•" };
        html.push_str(&format!(
            "<div class=\"{class}\" data-id=\"{}\"><div class=\"twisty\">{twisty}</div><div class=\"label\">{}</div></div>\n",
            escape_attr(&node.node_id()),
            escape_html(&node.label)
        ));
    }
    html.push_str("</div>");
    html
}

fn stub_card(title: &str, lines: &[&str]) -> String {
    let mut html = format!("<div class=\"stub-card\">\n  <h2>{}</h2>\n", escape_html(title));
    for line in lines {
        html.push_str(&format!("  <p>{}</p>\n", escape_html(line)));
    }
    html.push_str("</div>");
    html
}

pub struct PageContent<'a> {
    pub page: &'a NavPage,
    pub heading: &'a str,
    pub sub_heading: &'a str,
    pub left_body: String,
    pub breadcrumb: &'a str,
    pub tree: Option<&'a [TreeNode]>,
}

pub fn build_page_html(chrome: &SiteChrome, content: &PageContent<'_>) -> Result<String, SiteError> {
    let icon_html = match &chrome.icon {
        Some(file) => format!(
            r#"<img class="icon-img" src="./assets/{}" alt="icon" />"#,
            escape_attr(file)
        ),
        None => {
            let initial: String = chrome.title.chars().take(1).collect();
            format!(r#"<div class="icon-badge">{}</div>"#, escape_html(&initial))
        }
    };
    let config = PageConfig::new(content.page.id, chrome.build_base_url.clone());
    let boot = boot_script(&config, content.tree)?;

    Ok(format!(
        r#"<!doctype html>
<html lang="{lang}">
<head>
  <meta charset="utf-8" />
  <meta name="viewport" content="width=device-width, initial-scale=1" />
  <title>{page_title} - {site_title}</title>
  <link rel="stylesheet" href="./assets/site.css" />
</head>
<body>
  <header class="topbar">
    <div class="lead">
      <button class="brand" id="brandHome" title="Home">
        {icon_html}
        <div class="title">{site_title}</div>
      </button>
      <nav class="nav" aria-label="site nav">
{nav_html}
      </nav>
    </div>
    <div></div>
    <div class="search">
      <div>&#x1F50D;</div>
      <input id="q" type="search" placeholder="filter" />
    </div>
  </header>

  <main class="main">
    <section class="panel left">
      <div class="header">
        <div class="heading">{heading}</div>
        <div class="sub">{sub_heading}</div>
      </div>
      <div class="left-body" id="leftBody">
{left_body}
      </div>
    </section>

    <div class="splitter" id="splitter" title="drag to resize"></div>

    <section class="panel right">
      <div class="breadcrumb" id="breadcrumb">{breadcrumb}</div>
      <div class="viewer-area" id="viewerArea">
        <iframe id="viewer" title="viewer" scrolling="no" sandbox="allow-same-origin allow-popups allow-forms allow-scripts"></iframe>
      </div>
    </section>
  </main>

  <script src="./assets/app.js"></script>
  {boot}
</body>
</html>
"#,
        lang = escape_attr(&chrome.lang),
        page_title = escape_html(content.page.label),
        site_title = escape_html(&chrome.title),
        nav_html = build_nav_html(content.page.id),
        heading = escape_html(content.heading),
        sub_heading = escape_html(content.sub_heading),
        left_body = content.left_body,
        breadcrumb = escape_html(content.breadcrumb),
    ))
}

fn page_content<'a>(page: &'a NavPage, forest: &'a [TreeNode]) -> PageContent<'a> {
    match page.id {
        TREE_PAGE_ID => PageContent {
            page,
            heading: "Classification tree",
            sub_heading: "Click a node to open its document",
            left_body: render_initial_rows(forest),
            breadcrumb: "ready",
            tree: Some(forest),
        },
        "top" => PageContent {
            page,
            heading: "Classification tree",
            sub_heading: "Click a node to open its document",
            left_body: stub_card(
                page.label,
                &["This is the landing page. Dashboards and shortcuts will live here."],
            ),
            breadcrumb: page.label,
            tree: None,
        },
        _ => PageContent {
            page,
            heading: page.label,
            sub_heading: "Coming soon",
            left_body: stub_card(page.label, &["This page is not available yet."]),
            breadcrumb: page.label,
            tree: None,
        },
    }
}

/// Writes one HTML file per navigation entry into `site_dir`.
pub fn write_all_pages(site_dir: &Path, chrome: &SiteChrome, forest: &[TreeNode]) -> Result<Vec<PathBuf>, SiteError> {
    let mut written = Vec::with_capacity(NAV_PAGES.len());
    for page in &NAV_PAGES {
        let html = build_page_html(chrome, &page_content(page, forest))?;
        let path = site_dir.join(page.file);
        write_text_utf8(&path, &html)?;
        info!("write: {}", path.display());
        written.push(path);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chrome() -> SiteChrome {
        SiteChrome {
            title: "Rule<Navi>".to_string(),
            lang: "ja".to_string(),
            build_base_url: "../../".to_string(),
            icon: None,
        }
    }

    fn forest() -> Vec<TreeNode> {
        let mut kind = TreeNode::new("電気 </script>", "rules/files/elec");
        let mut rule = TreeNode::new("R-1", "rules/files/elec/R-1");
        rule.has_body = true;
        kind.children.push(rule);
        vec![kind]
    }

    #[test]
    fn nav_marks_exactly_one_active_tab() {
        let html = build_nav_html("rules");
        assert_eq!(html.matches("is-active").count(), 1);
        assert!(html.contains(r#"<a class="tab is-active" href="./rules.html" data-nav="rules">"#));
        assert_eq!(html.lines().count(), NAV_PAGES.len());
    }

    #[test]
    fn tree_page_embeds_config_and_forest() {
        let forest = forest();
        let page = &NAV_PAGES[3];
        let html = build_page_html(&chrome(), &page_content(page, &forest)).unwrap();

        assert!(html.contains(r#""buildBaseUrl":"../../""#));
        assert!(html.contains(r#""pageId":"rules""#));
        assert!(html.contains(r#""has_body":true"#));
        assert!(html.contains("電気 \\u003c/script\\u003e"));
        assert!(html.contains("\"reporterScript\":\"\\u003cscript\\u003e"));
        assert_eq!(html.matches("</script>").count(), 2);
        assert!(html.contains("<title>基準一覧 - Rule&lt;Navi&gt;</title>"));
        assert!(html.contains(r#"data-id="rules/files/elec""#));
        assert!(!html.contains(r#"data-id="rules/files/elec/R-1""#), "children stay collapsed");
    }

    #[test]
    fn placeholder_pages_have_no_tree() {
        let forest = forest();
        let page = &NAV_PAGES[1];
        let html = build_page_html(&chrome(), &page_content(page, &forest)).unwrap();
        assert!(html.contains("tree: []"));
        assert!(html.contains("Coming soon"));
        assert!(html.contains(r#"<div class="icon-badge">R</div>"#));
    }

    #[test]
    fn icon_is_referenced_when_copied() {
        let chrome = SiteChrome {
            icon: Some("icon.png".to_string()),
            ..chrome()
        };
        let html = build_page_html(&chrome, &page_content(&NAV_PAGES[0], &[])).unwrap();
        assert!(html.contains(r#"<img class="icon-img" src="./assets/icon.png" alt="icon" />"#));
    }

    #[test]
    fn boot_script_escapes_markup() {
        let config = PageConfig::new("top", "");
        let script = boot_script(&config, None).unwrap();
        assert!(script.starts_with("<script>\nRuleNavi.boot({ config: {"));
        assert!(script.ends_with("tree: [] });\n</script>"));
        assert_eq!(
            escape_script_json("{\"a\":\"</b> & c\u{2028}\"}"),
            r#"{"a":"\u003c/b\u003e \u0026 c\u2028"}"#
        );
    }

    #[test]
    fn comment_opener_in_label_cannot_reach_the_script_element() {
        let mut rule = TreeNode::new("a <!--<script> b", "rules/files/x");
        rule.has_body = true;
        let forest = vec![rule];
        let html = build_page_html(&chrome(), &page_content(&NAV_PAGES[3], &forest)).unwrap();

        let boot_start = html.find("RuleNavi.boot(").unwrap();
        let boot = &html[boot_start..];
        assert!(!boot.contains("<!--"));
        assert!(!boot.contains("<script>"));
        assert!(boot.contains("a \\u003c!--\\u003cscript\\u003e b"));
        assert_eq!(boot.matches("</script>").count(), 1);
        assert!(html.contains("a &lt;!--&lt;script&gt; b"), "pre-rendered row stays escaped");

        let payload_start = boot.find("tree: ").unwrap() + "tree: ".len();
        let payload_end = boot.rfind(" });").unwrap();
        let decoded: Vec<TreeNode> = serde_json::from_str(&boot[payload_start..payload_end]).unwrap();
        assert_eq!(decoded, forest);
    }
}
