use chrono::Local;
use rocket::request::FlashMessage;
use rocket::response::content::RawHtml;
use serde::Serialize;
use tera::{Context, Tera};
use tracing::instrument;

use crate::auth::{Role, User};
use crate::error::AppError;

macro_rules! template {
    ($name:literal) => {
        ($name, include_str!(concat!("../templates/", $name)))
    };
}

const TEMPLATES: &[(&str, &str)] = &[
    template!("base.html"),
    template!("index.html"),
    template!("dashboard.html"),
    template!("forbidden.html"),
    template!("not_found.html"),
    template!("auth/login.html"),
    template!("auth/register.html"),
    template!("children.html"),
    template!("assessments.html"),
    template!("requests.html"),
    template!("knowledge_base.html"),
    template!("reports.html"),
    template!("skills_map.html"),
    template!("progress.html"),
    template!("history.html"),
    template!("admin/users.html"),
    template!("admin/edit_requests.html"),
];

#[derive(Serialize)]
struct RoleOption {
    value: &'static str,
    label: &'static str,
}

/// Compiled page templates, managed as Rocket state.
pub struct Views {
    tera: Tera,
}

impl Views {
    pub fn load() -> Result<Self, tera::Error> {
        let mut tera = Tera::default();
        tera.add_raw_templates(TEMPLATES.iter().copied())?;
        Ok(Self { tera })
    }

    #[instrument(skip(self, context))]
    pub fn render(&self, name: &str, context: &Context) -> Result<RawHtml<String>, AppError> {
        Ok(RawHtml(self.tera.render(name, context)?))
    }
}

/// Context shared by every page: the signed-in user, a pending flash message
/// and today's date for date inputs.
pub fn page_context(user: Option<&User>, flash: Option<FlashMessage<'_>>) -> Context {
    let mut context = Context::new();
    context.insert("current_user", &user);
    context.insert(
        "flash_message",
        &flash.as_ref().map(|f| f.message().to_string()),
    );
    context.insert("flash_kind", &flash.as_ref().map(|f| f.kind().to_string()));
    context.insert("today", &Local::now().date_naive().to_string());
    context.insert(
        "role_options",
        &Role::ALL
            .iter()
            .map(|role| RoleOption {
                value: role.as_str(),
                label: role.label(),
            })
            .collect::<Vec<_>>(),
    );
    context
}
