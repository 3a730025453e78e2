use super::{
    handlers::{
        auth, content, health, orders,
        storefront::{self, types as catalog},
        users,
    },
    response::ErrorBody,
};
use utoipa::{
    openapi::{
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
        Contact, Info, InfoBuilder, License,
    },
    Modify, OpenApi,
};

/// Every documented route. Routes wired outside (like `/` or `OPTIONS /health`)
/// are not listed here.
#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        auth::admin::register,
        auth::admin::login,
        auth::admin::protected_route,
        users::register,
        users::login,
        storefront::categories::create,
        storefront::categories::get,
        storefront::categories::toggle,
        storefront::categories::list,
        storefront::products::create,
        storefront::products::update,
        storefront::products::toggle,
        storefront::products::get,
        storefront::products::list,
        storefront::products::next_order,
        storefront::variants::create,
        storefront::variants::update,
        storefront::variants::make_default,
        storefront::variants::list,
        storefront::front::products,
        storefront::front::product,
        content::banners::create,
        content::banners::update,
        content::banners::toggle,
        content::banners::get,
        content::banners::list,
        content::banners::active,
        content::testimonials::create,
        content::testimonials::update,
        content::testimonials::toggle,
        content::testimonials::get,
        content::testimonials::list,
        content::testimonials::active,
        content::site_config::upsert,
        content::site_config::get,
        orders::place,
        orders::mine,
        orders::list,
        orders::set_status,
    ),
    components(schemas(
        ErrorBody,
        health::Health,
        catalog::Category,
        catalog::CategoryDetail,
        catalog::Product,
        catalog::ProductDetail,
        catalog::StorefrontProduct,
        catalog::Variant,
        catalog::Attribute,
        catalog::NextOrder,
        catalog::CategoryForm,
        catalog::ProductForm,
        catalog::VariantForm,
        content::types::Banner,
        content::types::Testimonial,
        content::types::SiteConfig,
        content::types::BannerForm,
        content::types::TestimonialForm,
        content::types::SiteConfigForm,
        orders::Order,
        orders::OrderSummary,
    )),
    modifiers(&SecurityAddon),
    tags(
        (name = "health", description = "Service status"),
        (name = "auth", description = "Admin bootstrap, login and token checks"),
        (name = "users", description = "Customer registration and login"),
        (name = "categories", description = "Catalog categories"),
        (name = "products", description = "Products, ordered per category"),
        (name = "variants", description = "Product variants with a single default"),
        (name = "banners", description = "Home page banners"),
        (name = "testimonials", description = "Customer testimonials"),
        (name = "config", description = "Site configuration"),
        (name = "orders", description = "Customer orders"),
        (name = "storefront", description = "Public catalog"),
    )
)]
struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    let mut doc = ApiDoc::openapi();
    doc.info = cargo_info();
    doc
}

fn cargo_info() -> Info {
    // Use Cargo.toml metadata instead of the derive defaults.
    let mut info = InfoBuilder::new()
        .title(env!("CARGO_PKG_NAME"))
        .version(env!("CARGO_PKG_VERSION"))
        .description(optional_str(env!("CARGO_PKG_DESCRIPTION")))
        .build();

    info.contact = cargo_contact();
    info.license = cargo_license();
    info
}

fn cargo_contact() -> Option<Contact> {
    // Cargo authors are `;` separated and may include "Name <email>".
    let authors = env!("CARGO_PKG_AUTHORS");
    let primary = authors.split(';').next().map(str::trim)?;
    if primary.is_empty() {
        return None;
    }

    let (name, email) = parse_author(primary);
    if name.is_none() && email.is_none() {
        return None;
    }

    let mut contact = Contact::new();
    contact.name = name.map(str::to_string);
    contact.email = email.map(str::to_string);
    Some(contact)
}

fn cargo_license() -> Option<License> {
    let identifier = optional_str(env!("CARGO_PKG_LICENSE"))?;
    let mut license = License::new(identifier);
    license.identifier = Some(identifier.to_string());
    Some(license)
}

fn optional_str(value: &'static str) -> Option<&'static str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

fn non_empty(value: &str) -> Option<&str> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

fn parse_author(author: &str) -> (Option<&str>, Option<&str>) {
    match author.split_once('<') {
        Some((name, rest)) => (
            non_empty(name.trim()),
            non_empty(rest.trim_end_matches('>').trim()),
        ),
        None => (non_empty(author.trim()), None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_info_from_cargo() {
        let spec = openapi();
        assert_eq!(spec.info.title, env!("CARGO_PKG_NAME"));
        assert_eq!(spec.info.version, env!("CARGO_PKG_VERSION"));

        let contact = spec.info.contact;
        assert!(contact.is_some());
        if let Some(contact) = contact {
            assert_eq!(contact.name.as_deref(), Some("Team Shopdesk"));
            assert_eq!(contact.email.as_deref(), Some("team@shopdesk.dev"));
        }

        let license = spec.info.license;
        assert!(license.is_some());
        if let Some(license) = license {
            assert_eq!(license.name, "BSD-3-Clause");
            assert_eq!(license.identifier.as_deref(), Some("BSD-3-Clause"));
        }
    }

    #[test]
    fn openapi_tags_and_paths() {
        let spec = openapi();
        let tags = spec.tags.clone().unwrap_or_default();
        assert!(tags.iter().any(|tag| tag.name == "products"));
        assert!(tags.iter().any(|tag| tag.name == "storefront"));

        for path in [
            "/health",
            "/api/v1/admin/product/{id}",
            "/api/v1/admin/variant/{id}/default",
            "/api/v1/admin/banner",
            "/api/v1/front/testimonial",
            "/api/v1/user/order",
        ] {
            assert!(spec.paths.paths.contains_key(path), "missing {path}");
        }
    }

    #[test]
    fn multipart_forms_are_documented() {
        let doc = serde_json::to_value(openapi()).unwrap_or_default();
        let schemas = &doc["components"]["schemas"];
        for form in [
            "CategoryForm",
            "ProductForm",
            "VariantForm",
            "BannerForm",
            "TestimonialForm",
            "SiteConfigForm",
        ] {
            assert!(schemas[form].is_object(), "missing {form}");
        }

        let banner = &schemas["BannerForm"]["properties"];
        assert_eq!(banner["bannerImage"]["format"], "binary");
        assert_eq!(banner["order"]["type"], "integer");

        let body = &doc["paths"]["/api/v1/admin/banner"]["post"]["requestBody"]["content"];
        assert_eq!(
            body["multipart/form-data"]["schema"]["$ref"],
            "#/components/schemas/BannerForm"
        );
    }

    #[test]
    fn bearer_scheme_is_registered() {
        let spec = openapi();
        let schemes = spec
            .components
            .map(|components| components.security_schemes)
            .unwrap_or_default();
        assert!(schemes.contains_key("bearer"));
    }

    #[test]
    fn author_parsing() {
        assert_eq!(
            parse_author("Team Shopdesk <team@shopdesk.dev>"),
            (Some("Team Shopdesk"), Some("team@shopdesk.dev"))
        );
        assert_eq!(parse_author("Solo"), (Some("Solo"), None));
        assert_eq!(parse_author("<a@b.c>"), (None, Some("a@b.c")));
    }
}
