//! HTML pages shown in the OAuth popup window.

use maud::{html, Markup, PreEscaped, DOCTYPE};

/// Closes the popup shortly after it renders.
const AUTO_CLOSE_SCRIPT: &str = "setTimeout(function () { window.close(); }, 1200);";

fn popup_page(title: &str, body: Markup) -> Markup {
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="utf-8";
                title { (title) }
            }
            body style="font-family: ui-sans-serif, system-ui; padding: 24px; text-align: center;" {
                (body)
            }
        }
    }
}

/// Page shown after a successful token exchange.
#[must_use]
pub fn render_connected() -> Markup {
    popup_page(
        "Reddit Connected",
        html! {
            h3 { "Reddit connected successfully!" }
            p { "You can close this window and return to the app." }
            script { (PreEscaped(AUTO_CLOSE_SCRIPT)) }
        },
    )
}

/// Page shown when the authorization could not be completed.
#[must_use]
pub fn render_failed(message: &str) -> Markup {
    popup_page(
        "Reddit Connection Failed",
        html! {
            h3 { "Reddit connection failed" }
            p { (message) }
            p { "Please close this window and try again." }
        },
    )
}
