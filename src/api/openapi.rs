//! `OpenAPI` document for the mounted route groups.
//!
//! Each group documents its paths relative to its prefix. The served document
//! only holds enabled groups with `include_in_schema`, re-prefixed and
//! re-tagged from their [`RouteSetting`].

use utoipa::{
    OpenApi,
    openapi::{Contact, InfoBuilder, License, OpenApiBuilder, PathItem, Tag},
};

use super::{
    handlers::{auth, health, register, reset, users, verify},
    settings::{RouteGroup, RouteSetting, RouteSettings},
};

#[derive(OpenApi)]
#[openapi(paths(health::health))]
struct HealthDoc;

#[derive(OpenApi)]
#[openapi(paths(auth::jwt_login))]
struct JwtDoc;

#[derive(OpenApi)]
#[openapi(paths(auth::jwt_refresh))]
struct JwtRefreshDoc;

#[derive(OpenApi)]
#[openapi(paths(auth::cookie_login, auth::cookie_logout))]
struct CookieDoc;

#[derive(OpenApi)]
#[openapi(paths(register::register))]
struct RegisterDoc;

#[derive(OpenApi)]
#[openapi(paths(verify::request_verify_token, verify::verify))]
struct VerifyDoc;

#[derive(OpenApi)]
#[openapi(paths(reset::forgot_password, reset::reset_password))]
struct ResetDoc;

#[derive(OpenApi)]
#[openapi(paths(
    users::me,
    users::update_me,
    users::get_user,
    users::update_user,
    users::delete_user
))]
struct UsersDoc;

/// Document for the groups in `settings`. `mounted` lists the groups that
/// were actually registered.
#[must_use]
pub fn openapi(settings: &RouteSettings, mounted: &[RouteGroup]) -> utoipa::openapi::OpenApi {
    let mut doc = cargo_openapi();
    doc.merge(HealthDoc::openapi());

    let mut tags: Vec<String> = vec!["health".to_string()];
    for group in mounted {
        let setting = settings.get(*group);
        if !setting.include_in_schema {
            continue;
        }

        let mut group_doc = match group {
            RouteGroup::Jwt => {
                let mut jwt = JwtDoc::openapi();
                if setting.enable_refresh {
                    jwt.merge(JwtRefreshDoc::openapi());
                }
                jwt
            }
            RouteGroup::Cookie => CookieDoc::openapi(),
            RouteGroup::Register => RegisterDoc::openapi(),
            RouteGroup::Verify => VerifyDoc::openapi(),
            RouteGroup::Reset => ResetDoc::openapi(),
            RouteGroup::Users => UsersDoc::openapi(),
        };

        group_doc.paths.paths = std::mem::take(&mut group_doc.paths.paths)
            .into_iter()
            .map(|(path, mut item)| {
                retag(&mut item, setting);
                (setting.path(&path), item)
            })
            .collect();

        for tag in &setting.tags {
            if !tags.contains(tag) {
                tags.push(tag.clone());
            }
        }

        doc.merge(group_doc);
    }

    doc.tags = Some(tags.into_iter().map(Tag::new).collect());
    doc
}

fn retag(item: &mut PathItem, setting: &RouteSetting) {
    let operations = [
        &mut item.get,
        &mut item.put,
        &mut item.post,
        &mut item.delete,
        &mut item.options,
        &mut item.head,
        &mut item.patch,
        &mut item.trace,
    ];
    for operation in operations.into_iter().flatten() {
        operation.tags = Some(setting.tags.clone());
    }
}

fn cargo_openapi() -> utoipa::openapi::OpenApi {
    let mut info = InfoBuilder::new()
        .title(env!("CARGO_PKG_NAME"))
        .version(env!("CARGO_PKG_VERSION"))
        .description(optional_str(env!("CARGO_PKG_DESCRIPTION")))
        .build();

    info.contact = cargo_contact();
    info.license = optional_str(env!("CARGO_PKG_LICENSE")).map(|identifier| {
        let mut license = License::new(identifier);
        license.identifier = Some(identifier.to_string());
        license
    });

    OpenApiBuilder::new().info(info).build()
}

fn cargo_contact() -> Option<Contact> {
    // Cargo authors are `:` separated and may include "Name <email>".
    let primary = env!("CARGO_PKG_AUTHORS").split(':').next().map(str::trim)?;
    if primary.is_empty() {
        return None;
    }

    let (name, email) = match primary.split_once('<') {
        Some((name, email)) => (name.trim(), email.trim_end_matches('>').trim()),
        None => (primary, ""),
    };

    let mut contact = Contact::new();
    contact.name = optional_str(name).map(str::to_string);
    contact.email = optional_str(email).map(str::to_string);
    Some(contact)
}

fn optional_str(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}
