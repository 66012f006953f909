//! Server-rendered page: submission form on top, reverse-chronological
//! card gallery below. Maud gives compile-time templates with automatic
//! escaping; the stylesheet is embedded so the page ships as one response.

use maud::{html, Markup, DOCTYPE};
use time::macros::format_description;
use time::OffsetDateTime;

use crate::records::repo::FeedingRecord;
use crate::submission::form::FormController;

const CSS: &str = include_str!("../../static/style.css");

pub fn page(form: &FormController, records: &[FeedingRecord], load_error: Option<&str>) -> Markup {
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="UTF-8";
                meta name="viewport" content="width=device-width, initial-scale=1.0";
                title { "Office Cat Feeding Log" }
                style { (CSS) }
            }
            body {
                div.container {
                    header.page-header {
                        h1 { "Office Cat Feeding Log 🐾" }
                        p { "Who fed the strays out front, and when" }
                    }
                    (submission_form(form))
                    (gallery(records, load_error))
                }
            }
        }
    }
}

fn submission_form(form: &FormController) -> Markup {
    html! {
        section.card.submit-card {
            h2 { "Add a record" }
            @if let Some(err) = form.submit_error() {
                p.error { (err) }
            }
            form method="post" action="/records" enctype="multipart/form-data" {
                div.field {
                    label for="notes" { "Note" }
                    textarea id="notes" name="notes"
                        placeholder="How are the cats doing today?" {
                        (form.notes())
                    }
                }
                div.field {
                    label for="picture" { "Photo (optional)" }
                    input id="picture" name="picture" type="file"
                        accept="image/*,.heic,.heif" capture="environment";
                    @if let Some(err) = form.conversion_error() {
                        p.error { (err) }
                    }
                }
                button type="submit" disabled[form.is_pending()] { "Save record" }
            }
        }
    }
}

fn gallery(records: &[FeedingRecord], load_error: Option<&str>) -> Markup {
    html! {
        section.gallery {
            h2 { "Recent records" }
            @if let Some(err) = load_error {
                p.error { (err) }
            }
            @if records.is_empty() {
                p.empty { "No records yet." }
            } @else {
                div.gallery-grid {
                    @for record in records {
                        (record_card(record))
                    }
                }
            }
        }
    }
}

fn record_card(record: &FeedingRecord) -> Markup {
    html! {
        article.card.record-card {
            @if let Some(url) = &record.image_url {
                img src=(url) alt=(record.notes.as_deref().unwrap_or("Cat photo"));
            }
            @if let Some(notes) = &record.notes {
                p.notes { (notes) }
            }
            p.timestamp { (format_timestamp(record.created_at)) }
        }
    }
}

fn format_timestamp(at: OffsetDateTime) -> String {
    let format = format_description!("[year]-[month]-[day] [hour]:[minute]");
    at.format(&format)
        .map(|t| format!("{} UTC", t))
        .unwrap_or_else(|_| at.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;
    use uuid::Uuid;

    fn record(notes: Option<&str>, image_url: Option<&str>) -> FeedingRecord {
        FeedingRecord {
            id: Uuid::new_v4(),
            notes: notes.map(str::to_string),
            image_url: image_url.map(str::to_string),
            created_at: datetime!(2026-08-06 09:15 UTC),
        }
    }

    #[test]
    fn failed_form_keeps_the_note_and_shows_the_error() {
        let mut form = FormController::new();
        form.set_notes("fed at 9am");
        form.begin();
        form.fail(&crate::submission::SubmitError::UploadFailed(
            "storage down".into(),
        ));

        let html = page(&form, &[], None).into_string();
        assert!(html.contains("fed at 9am"));
        assert!(html.contains("storage down"));
    }

    #[test]
    fn conversion_error_renders_in_its_own_slot() {
        let mut form = FormController::new();
        form.begin();
        form.fail(&crate::submission::SubmitError::ConversionFailed(
            "unreadable file".into(),
        ));

        let html = submission_form(&form).into_string();
        assert!(html.contains("unreadable file"));
    }

    #[test]
    fn gallery_renders_cards_in_given_order() {
        let records = vec![
            record(Some("evening"), Some("https://cdn.test/b.jpg")),
            record(Some("morning"), None),
        ];
        let html = gallery(&records, None).into_string();

        let evening = html.find("evening").unwrap();
        let morning = html.find("morning").unwrap();
        assert!(evening < morning);
        assert!(html.contains("https://cdn.test/b.jpg"));
        assert!(html.contains("2026-08-06 09:15 UTC"));
    }

    #[test]
    fn empty_gallery_has_a_friendly_message() {
        let html = gallery(&[], None).into_string();
        assert!(html.contains("No records yet."));
    }

    #[test]
    fn load_error_is_shown_without_breaking_the_page() {
        let html = gallery(&[], Some("Could not load earlier records.")).into_string();
        assert!(html.contains("Could not load earlier records."));
    }

    #[test]
    fn user_text_is_escaped() {
        let records = vec![record(Some("<script>alert(1)</script>"), None)];
        let html = gallery(&records, None).into_string();
        assert!(!html.contains("<script>alert(1)</script>"));
        assert!(html.contains("&lt;script&gt;"));
    }
}
