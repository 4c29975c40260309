//! Server-rendered HTML: the tool grid, one form per tool, and error pages

use pdfmaster_core::{ActiveTool, Tool};

const STYLE: &str = r#"
body { font-family: system-ui, sans-serif; background: #f5f6f8; margin: 0; color: #222; }
header { background: #fff; border-bottom: 1px solid #e3e3e3; padding: 16px 32px; }
header a { color: inherit; text-decoration: none; font-weight: 700; font-size: 20px; }
main { max-width: 960px; margin: 32px auto; padding: 0 16px; }
.grid { display: grid; grid-template-columns: repeat(auto-fill, minmax(200px, 1fr)); gap: 20px; }
.card { background: #fff; border-radius: 12px; padding: 24px; text-align: center;
        box-shadow: 0 2px 6px rgba(0,0,0,.06); color: inherit; text-decoration: none; }
.card:hover { box-shadow: 0 4px 14px rgba(0,0,0,.12); }
.card-icon { font-size: 40px; margin-bottom: 15px; }
.card-title { font-weight: 700; margin-bottom: 6px; }
.card-desc { font-size: 13px; color: #666; line-height: 1.4; }
form { background: #fff; border-radius: 12px; padding: 24px; display: grid; gap: 14px; }
label { display: grid; gap: 6px; font-weight: 600; }
button { background: #e5322d; color: #fff; border: 0; border-radius: 8px; padding: 10px 18px; font-size: 15px; cursor: pointer; }
button.secondary { background: #555; }
.error { background: #fdecea; color: #8a1c17; border-radius: 8px; padding: 16px; }
#preview figure { margin: 12px 0; }
#preview img { max-width: 100%; border: 1px solid #ddd; margin-top: 6px; }
"#;

/// Fetches a first-page preview of every PDF picked
const PREVIEW_SCRIPT: &str = r#"
<div id="preview"></div>
<script>
async function previewFile(file, box) {
  const body = new FormData();
  body.append('file', file);
  const figure = document.createElement('figure');
  const caption = document.createElement('figcaption');
  figure.append(caption);
  box.append(figure);
  const res = await fetch('/api/preview', { method: 'POST', body: body });
  if (!res.ok) { caption.textContent = file.name + ': preview unavailable'; return; }
  caption.textContent = file.name + ' (pages: ' + res.headers.get('x-page-count') + ')';
  const img = document.createElement('img');
  img.src = URL.createObjectURL(await res.blob());
  figure.append(img);
}
document.querySelectorAll('input[type=file][data-preview]').forEach(function (input) {
  input.addEventListener('change', function () {
    const box = document.getElementById('preview');
    box.textContent = '';
    Array.from(input.files).forEach(function (file) { previewFile(file, box); });
  });
});
document.querySelectorAll('button[data-result-preview]').forEach(function (button) {
  button.addEventListener('click', async function () {
    const form = button.closest('form');
    const box = document.getElementById('preview');
    box.textContent = 'Working...';
    const res = await fetch(form.action, { method: 'POST', body: new FormData(form) });
    if (!res.ok) { box.innerHTML = await res.text(); return; }
    const body = new FormData();
    body.append('file', await res.blob(), 'result.pdf');
    const shot = await fetch('/api/preview', { method: 'POST', body: body });
    if (!shot.ok) { box.textContent = 'Preview unavailable'; return; }
    const img = document.createElement('img');
    img.src = URL.createObjectURL(await shot.blob());
    box.textContent = '';
    box.append(img);
  });
});
</script>
"#;

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn layout(title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{title}</title>
<style>{STYLE}</style>
</head>
<body>
<header><a href="/">PDF Master</a></header>
<main>
{body}
</main>
</body>
</html>"#,
        title = escape_html(title),
    )
}

/// The page for whatever the user is looking at
pub fn page(active: ActiveTool) -> String {
    match active {
        ActiveTool::Home => home(),
        ActiveTool::Tool(tool) => tool_page(tool),
    }
}

fn home() -> String {
    let cards: String = Tool::ALL
        .iter()
        .map(|tool| {
            format!(
                r#"<a class="card" href="/tools/{id}"><div class="card-icon">{icon}</div><div class="card-title">{title}</div><div class="card-desc">{desc}</div></a>"#,
                id = tool.id(),
                icon = tool.icon(),
                title = tool.title(),
                desc = tool.description(),
            )
        })
        .collect();
    layout(
        "PDF Master",
        &format!(r#"<h1>Every PDF tool in one place</h1><div class="grid">{}</div>"#, cards),
    )
}

fn file_input(tool: Tool) -> String {
    let (name, multiple, label) = if tool.multiple_files() {
        ("files", " multiple", "Select files")
    } else {
        ("file", "", "Select a file")
    };
    // Merge previews every selected file
    let preview = if tool.accepts() == ".pdf" {
        " data-preview"
    } else {
        ""
    };
    format!(
        r#"<label>{label}<input type="file" name="{name}" accept="{accept}" required{multiple}{preview}></label>"#,
        accept = tool.accepts(),
    )
}

/// Inputs specific to one tool, besides the upload
fn tool_fields(tool: Tool) -> &'static str {
    match tool {
        Tool::Split => {
            r#"<label>Page ranges (e.g. 1-5, 8)<input type="text" name="ranges" placeholder="1-5, 8" required></label>"#
        }
        Tool::Sign => concat!(
            r#"<label>Signature image (PNG/JPG)<input type="file" name="image" accept=".png,.jpg,.jpeg" required></label>"#,
            r#"<label>Page<input type="number" name="page" min="1" value="1"></label>"#,
            r#"<label>Width<input type="range" name="width" min="50" max="500" value="150"></label>"#,
            r#"<label>Position X<input type="range" name="x" min="0" max="600" value="100"></label>"#,
            r#"<label>Position Y<input type="range" name="y" min="0" max="800" value="500"></label>"#,
        ),
        Tool::Protect => {
            r#"<label>Password<input type="password" name="password" required></label>"#
        }
        Tool::Rotate => concat!(
            r#"<label>Rotation angle<select name="angle">"#,
            r#"<option value="90">90°</option><option value="180">180°</option><option value="270">270°</option>"#,
            r#"</select></label>"#,
        ),
        _ => "",
    }
}

fn tool_page(tool: Tool) -> String {
    let extra_button = match tool {
        Tool::Sign => {
            r#"<button type="submit" class="secondary" formaction="/tools/sign/preview" formtarget="_blank">Preview placement</button>"#
        }
        // PDF results worth a look before downloading
        Tool::Rotate | Tool::JpgPdf | Tool::OfficePdf => {
            r#"<button type="button" class="secondary" data-result-preview>Preview result</button>"#
        }
        _ => "",
    };
    let body = format!(
        r#"<p><a href="/">&larr; Back</a></p>
<h1>{icon} {title}</h1>
<p>{desc}</p>
<form method="post" action="/tools/{id}" enctype="multipart/form-data">
{file_input}
{fields}
<div>{extra_button} <button type="submit">{title}</button></div>
</form>
{PREVIEW_SCRIPT}"#,
        icon = tool.icon(),
        title = tool.title(),
        desc = tool.description(),
        id = tool.id(),
        file_input = file_input(tool),
        fields = tool_fields(tool),
    );
    layout(tool.title(), &body)
}

/// The catch-all failure page
pub fn error_page(message: &str) -> String {
    layout(
        "Error",
        &format!(
            r#"<div class="error">Error: {}</div><p><a href="javascript:history.back()">&larr; Back</a></p>"#,
            escape_html(message)
        ),
    )
}
