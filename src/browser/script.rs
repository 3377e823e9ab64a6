//! JavaScript snippets evaluated in the page by [`ChromeBrowser`](super::ChromeBrowser).
//!
//! Element paths are shipped as JSON and re-resolved inside the page on every
//! call, so no remote object handle ever outlives a single evaluation. Every
//! snippet returns its result JSON-encoded, since `Runtime.evaluate` only
//! hands back primitives by value.

use crate::core::ElementPath;
use crate::selectors::Candidate;
use serde::Deserialize;
use serde_json::{json, Value};

/// Shared helpers: visibility filter, candidate query and path resolution.
const PRELUDE: &str = r#"
    const visible = (el) => !!(el.offsetWidth || el.offsetHeight || el.getClientRects().length);
    const query = (root, step) => {
        let nodes = Array.from(root.querySelectorAll(step.css)).filter(visible);
        if (step.text) {
            const needle = step.text.toLowerCase();
            nodes = nodes.filter((n) => (n.innerText || n.textContent || '').toLowerCase().includes(needle));
        }
        return nodes;
    };
    const resolve = (steps) => {
        let node = document;
        for (const step of steps) {
            const matches = query(node, step);
            if (step.index >= matches.length) return null;
            node = matches[step.index];
        }
        return node;
    };
"#;

fn step_json(candidate: &Candidate, index: usize) -> Value {
    json!({
        "css": candidate.css_part(),
        "text": candidate.text_part(),
        "index": index,
    })
}

fn path_json(path: Option<&ElementPath>) -> String {
    let steps: Vec<Value> = path
        .map(|p| {
            p.steps()
                .iter()
                .map(|s| step_json(&s.candidate, s.index))
                .collect()
        })
        .unwrap_or_default();
    Value::Array(steps).to_string()
}

fn wrap(body: &str) -> String {
    format!("JSON.stringify((function() {{ {PRELUDE} {body} }})())")
}

/// Returns a match count, or `{ invalidSelector }` when the page rejects the CSS.
pub fn count(scope: Option<&ElementPath>, candidate: &Candidate) -> String {
    wrap(&format!(
        r#"
        try {{
            const root = resolve({scope});
            if (!root) return 0;
            return query(root, {step}).length;
        }} catch (e) {{
            if (e && e.name === 'SyntaxError') return {{ invalidSelector: e.message }};
            throw e;
        }}
        "#,
        scope = path_json(scope),
        step = step_json(candidate, 0),
    ))
}

pub fn inner_text(path: &ElementPath) -> String {
    wrap(&format!(
        r#"
        const el = resolve({path});
        if (!el) return null;
        return el.innerText !== undefined ? el.innerText : el.textContent;
        "#,
        path = path_json(Some(path)),
    ))
}

pub fn click(path: &ElementPath) -> String {
    wrap(&format!(
        r#"
        const el = resolve({path});
        if (!el) return {{ success: false, error: 'Element not found' }};
        try {{
            el.scrollIntoView({{ block: 'center' }});
            el.click();
            return {{ success: true }};
        }} catch (e) {{
            return {{ success: false, error: e.message }};
        }}
        "#,
        path = path_json(Some(path)),
    ))
}

pub fn fill(path: &ElementPath, text: &str) -> String {
    wrap(&format!(
        r#"
        const el = resolve({path});
        if (!el) return {{ success: false, error: 'Element not found' }};
        const text = {text};
        try {{
            el.focus();
            if (el.isContentEditable) {{
                el.textContent = text;
            }} else {{
                el.value = text;
            }}
            el.dispatchEvent(new Event('input', {{ bubbles: true }}));
            el.dispatchEvent(new Event('change', {{ bubbles: true }}));
            return {{ success: true }};
        }} catch (e) {{
            return {{ success: false, error: e.message }};
        }}
        "#,
        path = path_json(Some(path)),
        text = Value::String(text.to_string()),
    ))
}

pub fn focus(path: &ElementPath) -> String {
    wrap(&format!(
        r#"
        const el = resolve({path});
        if (!el) return {{ success: false, error: 'Element not found' }};
        el.focus();
        return {{ success: true }};
        "#,
        path = path_json(Some(path)),
    ))
}

pub const READY_STATE: &str = "document.readyState";

/// Installs a per-document network tracker on first use and reports it.
///
/// `finished` counts resource timing entries through an observer, so it keeps
/// growing after the timing buffer (250 entries by default) fills. `pending`
/// counts fetch and XHR calls still open. Only requests issued after the
/// tracker went in are seen in flight; anything else shows up once it
/// finishes.
pub const NETWORK_ACTIVITY: &str = r#"
JSON.stringify((function() {
    if (window.__notebookPilotNetwork === undefined) {
        const net = { finished: performance.getEntriesByType('resource').length, pending: 0 };
        window.__notebookPilotNetwork = net;
        new PerformanceObserver((list) => { net.finished += list.getEntries().length; })
            .observe({ type: 'resource' });
        const fetch = window.fetch;
        window.fetch = function(...args) {
            net.pending += 1;
            return fetch.apply(this, args).finally(() => { net.pending -= 1; });
        };
        const send = XMLHttpRequest.prototype.send;
        XMLHttpRequest.prototype.send = function(...args) {
            net.pending += 1;
            this.addEventListener('loadend', () => { net.pending -= 1; }, { once: true });
            return send.apply(this, args);
        };
    }
    return window.__notebookPilotNetwork;
})())
"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct NetworkActivity {
    pub finished: u64,
    pub pending: u64,
}

/// Reads what [`count`] returned.
pub fn match_count(result: &Value) -> Result<usize, String> {
    if let Some(reason) = result.get("invalidSelector") {
        return Err(reason.as_str().unwrap_or("rejected by the page").to_string());
    }
    Ok(result.as_u64().unwrap_or(0) as usize)
}

/// Reads the `{ success, error }` shape the action scripts return.
pub fn action_outcome(result: &Value) -> Result<(), String> {
    if result
        .get("success")
        .and_then(|v| v.as_bool())
        .unwrap_or(false)
    {
        return Ok(());
    }
    Err(result
        .get("error")
        .and_then(|v| v.as_str())
        .unwrap_or("Unknown error")
        .to_string())
}
