//! JavaScript injected by [`super::EokaDriver`].
//!
//! Every frame-scoped expression runs through [`in_frame`], which walks
//! `window.frames` by index and compiles the expression with the frame's own
//! `Function` constructor, so `document` and `window` are the frame's.

use super::Target;
use serde_json::json;

/// Lists every frame below the top window, depth first.
pub const LIST_FRAMES: &str = r#"(() => {
    const out = [];
    const walk = (win, path) => {
        let count = 0;
        try { count = win.frames.length; } catch (e) { return; }
        for (let i = 0; i < count; i++) {
            const child = win.frames[i];
            const p = path.concat([i]);
            let name = '', url = '', loaded = false;
            try {
                name = child.name || '';
                url = child.location.href;
                loaded = child.document.readyState === 'complete';
            } catch (e) {}
            out.push({ name, url, loaded, path: p });
            walk(child, p);
        }
    };
    walk(window, []);
    return out;
})()"#;

/// Resolves a target spec to an element of `document`, or null.
const FIND_TARGET: &str = r#"((spec) => {
    const norm = (s) => (s || '').replace(/\s+/g, ' ').trim().toLowerCase();
    if (spec.kind === 'css') return document.querySelector(spec.css);
    if (spec.kind === 'nth') return document.querySelectorAll(spec.css)[spec.index] || null;
    if (spec.kind === 'text') {
        const want = norm(spec.text);
        for (const el of document.querySelectorAll(spec.css)) {
            if (norm(el.textContent).includes(want)) return el;
        }
        return null;
    }
    if (spec.kind === 'scan') {
        const needles = spec.needles.map(norm);
        for (const el of document.querySelectorAll('a, img, input, button, span, [onclick]')) {
            const hay = [el.textContent, el.getAttribute('alt'), el.getAttribute('value'),
                el.getAttribute('title'), el.getAttribute('onclick')].map(norm).join(' ');
            if (needles.some((n) => n && hay.includes(n))) return el;
        }
    }
    return null;
})"#;

fn quote(s: &str) -> String {
    serde_json::Value::String(s.to_string()).to_string()
}

fn target_spec(target: &Target) -> serde_json::Value {
    match target {
        Target::Css(css) => json!({ "kind": "css", "css": css }),
        Target::Nth { css, index } => json!({ "kind": "nth", "css": css, "index": index }),
        Target::Text { css, text } => json!({ "kind": "text", "css": css, "text": text }),
        Target::Scan(needles) => json!({ "kind": "scan", "needles": needles }),
    }
}

fn find(target: &Target) -> String {
    format!("{}({})", FIND_TARGET, target_spec(target))
}

/// Wrap `body` so it is evaluated inside the frame at `path`.
///
/// Returns `{ detached: true }` when the path no longer leads to a frame, or
/// the frame's URL differs from `expected_url`.
pub fn in_frame(path: &[usize], expected_url: Option<&str>, body: &str) -> String {
    let path = serde_json::to_string(path).unwrap_or_else(|_| "[]".into());
    let expected = expected_url.map(quote).unwrap_or_else(|| "null".into());
    r#"(() => {
    let win = window;
    for (const i of __PATH__) {
        let count = 0;
        try { count = win.frames.length; } catch (e) { return { detached: true }; }
        if (i >= count) return { detached: true };
        win = win.frames[i];
    }
    try {
        const expected = __URL__;
        if (expected !== null && win.location.href !== expected) return { detached: true };
        const fn = new win.Function('return (' + __BODY__ + ')');
        return { detached: false, value: fn.call(win) };
    } catch (e) {
        return { detached: true, error: String(e) };
    }
})()"#
        .replace("__PATH__", &path)
        .replace("__URL__", &expected)
        .replace("__BODY__", &quote(body))
}

pub fn html() -> String {
    "document.documentElement ? document.documentElement.outerHTML : ''".into()
}

pub fn count(css: &str) -> String {
    format!("document.querySelectorAll({}).length", quote(css))
}

pub fn exists(target: &Target) -> String {
    format!("!!{}", find(target))
}

pub fn click(target: &Target) -> String {
    format!(
        "((el) => {{ if (!el) return false; el.click(); return true; }})({})",
        find(target)
    )
}

pub fn text(target: &Target) -> String {
    format!(
        "((el) => el ? (el.innerText || el.textContent || '').trim() : null)({})",
        find(target)
    )
}

/// Clear and focus an input so typed text lands in it.
pub fn prepare_input(css: &str) -> String {
    format!(
        "((el) => {{ if (!el) return false; el.value = ''; el.focus(); return true; }})(document.querySelector({}))",
        quote(css)
    )
}

pub fn input_value(css: &str) -> String {
    format!(
        "((el) => el ? String(el.value) : null)(document.querySelector({}))",
        quote(css)
    )
}

/// Set the value directly and fire the events form widgets listen for.
pub fn set_value(css: &str, value: &str) -> String {
    format!(
        "((el) => {{ if (!el) return false; el.value = {}; \
         for (const t of ['input', 'change']) el.dispatchEvent(new Event(t, {{ bubbles: true }})); \
         if (el.blur) el.blur(); return true; }})(document.querySelector({}))",
        quote(value),
        quote(css)
    )
}

pub fn invoke(function: &str, args: &[serde_json::Value]) -> String {
    let args = serde_json::Value::Array(args.to_vec());
    format!(
        "((f) => {{ if (typeof f !== 'function') return false; f.apply(window, {}); return true; }})(window[{}])",
        args,
        quote(function)
    )
}
