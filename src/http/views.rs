//! Server-rendered tracking page.

use crate::models::Visit;

pub fn render_track_page(visits: &[Visit]) -> String {
    let mut rows = String::new();
    for visit in visits {
        let when = chrono::DateTime::from_timestamp(visit.visited_at, 0)
            .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
            .unwrap_or_else(|| visit.visited_at.to_string());

        rows.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
            escape(&visit.ip),
            escape(visit.user_agent.as_deref().unwrap_or("-")),
            escape(visit.accept_lang.as_deref().unwrap_or("-")),
            escape(&when),
        ));
    }

    let body = if visits.is_empty() {
        "<p>No visits recorded yet.</p>".to_string()
    } else {
        format!(
            "<table>\n<thead><tr><th>IP</th><th>User agent</th><th>Language</th><th>Visited at</th></tr></thead>\n<tbody>\n{rows}</tbody>\n</table>"
        )
    };

    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>Visit statistics</title>\n<style>\nbody {{ font-family: sans-serif; margin: 2rem; }}\ntable {{ border-collapse: collapse; }}\nth, td {{ border: 1px solid #ccc; padding: 0.4rem 0.8rem; text-align: left; }}\n</style>\n</head>\n<body>\n<h1>Visit statistics</h1>\n<p>{count} visit(s), most recent first.</p>\n{body}\n</body>\n</html>\n",
        count = visits.len(),
    )
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn visit(ip: &str, agent: Option<&str>, at: i64) -> Visit {
        Visit {
            id: 1,
            link_id: 1,
            ip: ip.to_string(),
            user_agent: agent.map(str::to_string),
            accept_lang: Some("en-US".to_string()),
            visited_at: at,
        }
    }

    #[test]
    fn test_empty_page() {
        let page = render_track_page(&[]);
        assert!(page.contains("No visits recorded yet"));
        assert!(page.contains("0 visit(s)"));
    }

    #[test]
    fn test_rows_rendered() {
        let visits = vec![visit("203.0.113.1", Some("curl/8.0"), 1700000000)];
        let page = render_track_page(&visits);
        assert!(page.contains("203.0.113.1"));
        assert!(page.contains("curl/8.0"));
        assert!(page.contains("en-US"));
        assert!(page.contains("2023-11-14"));
    }

    #[test]
    fn test_user_agent_is_escaped() {
        let visits = vec![visit("1.2.3.4", Some("<script>alert(1)</script>"), 1700000000)];
        let page = render_track_page(&visits);
        assert!(!page.contains("<script>"));
        assert!(page.contains("&lt;script&gt;"));
    }
}
