//! HTML pages rendered with Maud.

use crate::storage::StoredFile;
use chrono::{DateTime, Local};
use humansize::{format_size, BINARY};
use maud::{html, Markup, PreEscaped, DOCTYPE};
use std::path::Path;

const STYLE: &str = r#"
body { margin: 0; padding: 24px; background: #000; color: #fff; line-height: 1.4;
       font-family: ui-monospace, SFMono-Regular, Menlo, Consolas, monospace; }
a { color: #fff; }
.box { border: 1px solid #444; border-radius: 10px; padding: 16px; margin-bottom: 16px; background: #0a0a0a; }
input[type="submit"] { background: #111; color: #fff; border: 1px solid #555; padding: 8px 14px; border-radius: 8px; cursor: pointer; }
input[type="submit"]:hover { border-color: #aaa; }
.msg { color: #9f9; margin-top: 8px; }
.err { color: #f99; margin-top: 8px; }
ul { margin: 0; padding-left: 22px; }
li { margin: 4px 0; }
.small, .file-info { color: #bbb; font-size: 12px; }
"#;

/// Outcome of the last action, shown above the listing.
#[derive(Debug)]
pub enum Notice {
    None,
    Message(String),
    Error(String),
}

/// The upload form plus the current contents of the storage directory.
pub fn index_page(storage_dir: &Path, files: &[StoredFile], notice: &Notice) -> Markup {
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="UTF-8";
                meta name="viewport" content="width=device-width, initial-scale=1.0";
                title { "File Upload" }
                style { (PreEscaped(STYLE)) }
            }
            body {
                h1 { "Upload Server" }

                div class="box" {
                    form method="POST" action="/upload" enctype="multipart/form-data" {
                        input type="file" name="file" required;
                        " "
                        input type="submit" value="Upload";
                    }
                    @match notice {
                        Notice::Message(msg) => {
                            div class="msg" { (msg) }
                        }
                        Notice::Error(err) => {
                            div class="err" { (err) }
                        }
                        Notice::None => {}
                    }
                    div class="small" { "Files are stored in: " (storage_dir.display()) }
                }

                div class="box" {
                    h2 { "Uploaded files (" (files.len()) ")" }
                    @if files.is_empty() {
                        div class="small" { "No files uploaded yet." }
                    } @else {
                        ul #file-list {
                            @for file in files {
                                li {
                                    a href={"/files/" (urlencoding::encode(&file.name))} { (file.name) }
                                    " "
                                    span class="file-info" {
                                        (format_size(file.size, BINARY))
                                        @if let Some(modified) = format_modified(file) {
                                            ", " (modified)
                                        }
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }
    }
}

/// Standalone error fragment for failures outside the upload page.
pub fn error_page(message: &str) -> Markup {
    html! {
        div style="padding: 10px; border: 1px solid red; color: red; margin: 10px;" {
            h2 { "Error" }
            p { (message) }
        }
    }
}

fn format_modified(file: &StoredFile) -> Option<String> {
    file.modified.map(|mod_time| {
        let datetime: DateTime<Local> = mod_time.into();
        datetime.format("%Y-%m-%d %H:%M").to_string()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::SystemTime;

    fn file(name: &str, size: u64) -> StoredFile {
        StoredFile {
            name: name.to_string(),
            size,
            modified: Some(SystemTime::now()),
        }
    }

    #[test]
    fn lists_files_with_encoded_links() {
        let files = [file("my report.pdf", 2048), file("b.txt", 3)];
        let page = index_page(Path::new("/srv/uploads"), &files, &Notice::None).into_string();

        assert!(page.contains("Uploaded files (2)"));
        assert!(page.contains(r#"href="/files/my%20report.pdf""#));
        assert!(page.contains("2 KiB"));
        assert!(page.contains("Files are stored in: /srv/uploads"));
        assert!(!page.contains("class=\"err\""));
    }

    #[test]
    fn empty_directory_says_so() {
        let page = index_page(Path::new("/tmp"), &[], &Notice::None).into_string();
        assert!(page.contains("No files uploaded yet."));
    }

    #[test]
    fn notices_are_escaped() {
        let page = index_page(
            Path::new("/tmp"),
            &[],
            &Notice::Error("<script>bad</script>".to_string()),
        )
        .into_string();
        assert!(page.contains("class=\"err\""));
        assert!(page.contains("&lt;script&gt;"));
    }
}
