use serde::{Deserialize, Serialize};
use strongroom::prelude::*;

// ---------------------------------------------------------------------------
// App types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Profile {
    name: String,
    email: String,
}

/// The bits of an HTTP response this demo cares about.
struct Page {
    status: u16,
    body: String,
    cookies: CookieSink,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// `POST /profile`: save the form, flash a notice, redirect.
fn save_profile(session: &Session, form: Profile) -> Result<(u16, String), StrongroomError> {
    session.lock().set("profile", &form)?;
    session.flash(format!("Saved profile for {}", form.name));
    Ok((303, "see /profile".into()))
}

/// `GET /profile`: show pending notices and the stored profile.
fn show_profile(session: &Session) -> Result<(u16, String), StrongroomError> {
    let notices = session.pop_flash("");
    let profile: Option<Profile> = session.lock().get("profile")?;
    let token = session.get_csrf_token();

    let mut body = String::new();
    for notice in &notices {
        body.push_str(&format!("[notice] {notice}\n"));
    }
    match profile {
        Some(p) => body.push_str(&format!("{} <{}>\n", p.name, p.email)),
        None => body.push_str("no profile yet\n"),
    }
    body.push_str(&format!("<form csrf_token={token}>"));
    Ok((200, body))
}

// ---------------------------------------------------------------------------
// Minimal "framework"
// ---------------------------------------------------------------------------

/// Runs one request the way a web framework would: resolve the session,
/// call the handler, apply response callbacks, commit.
fn dispatch(
    factory: &SessionFactory<MemoryDatabase>,
    cookie_header: Option<&str>,
    handler: impl FnOnce(&Session) -> Result<(u16, String), StrongroomError>,
) -> Result<Page, StrongroomError> {
    let mut request = match cookie_header {
        Some(header) => RequestContext::from_cookie_header(header),
        None => RequestContext::new(),
    };
    let session = factory.session(&mut request)?;

    let outcome = handler(&session);
    let mut cookies = CookieSink::default();
    request.finalize(&mut cookies, outcome.is_err());
    let (status, body) = outcome?;

    let written = factory.provider().connect().commit();
    tracing::debug!(written, "transaction committed");

    Ok(Page {
        status,
        body,
        cookies,
    })
}

fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    strongroom::init_tracing("info")?;

    let config = SessionFactoryConfig::from_json(
        r#"{ "secret": "change-me", "timeout": 1800, "cookie": { "http_only": true } }"#,
    )?;
    let factory = SessionFactory::new(config, MemoryDatabase::new());

    let form = Profile {
        name: "Ada".into(),
        email: "ada@example.com".into(),
    };
    let post = dispatch(&factory, None, |s| save_profile(s, form))?;
    eprintln!("POST /profile -> {}", post.status);
    for header in post.cookies.header_values() {
        eprintln!("  Set-Cookie: {header}");
    }

    let Some(cookie) = post.cookies.get("session_id") else {
        return Err("no session cookie was set".into());
    };
    let header = format!("session_id={}", cookie.value);

    for _ in 0..2 {
        let get = dispatch(&factory, Some(header.as_str()), show_profile)?;
        eprintln!("GET /profile -> {}\n{}", get.status, get.body);
    }

    Ok(())
}
