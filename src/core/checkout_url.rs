use crate::config::toml_config::{CommerceConfig, ProviderConfig};
use crate::core::region::RegionRoute;
use crate::core::resolver::EndpointResolver;
use crate::domain::catalog::{AddOnFlags, EndpointId};
use crate::domain::model::{AttributionSnapshot, Contact, EndpointMapping, Selection};
use crate::utils::error::{CheckoutError, Result};
use url::Url;

/// 只保留數字（電話、稅號）
pub fn digits_only(value: &str) -> String {
    value.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// 組合結帳網址：基本網址 + 端點路徑 + 客戶、旗標與追蹤參數
#[derive(Debug, Clone)]
pub struct CheckoutUrlBuilder<'a> {
    provider_name: &'a str,
    provider: &'a ProviderConfig,
}

impl<'a> CheckoutUrlBuilder<'a> {
    pub fn new(provider_name: &'a str, provider: &'a ProviderConfig) -> Self {
        Self {
            provider_name,
            provider,
        }
    }

    pub fn for_route(config: &'a CommerceConfig, route: &'a RegionRoute) -> Result<Self> {
        Ok(Self::new(&route.provider, config.provider(&route.provider)?))
    }

    /// 客戶參數；沒填的欄位整個省略，不送空值
    pub fn customer_params(&self, contact: &Contact) -> Vec<(String, String)> {
        let names = &self.provider.params;
        let mut params = Vec::new();

        if let Some(name) = contact.name.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
            params.push((names.name.clone(), name.to_string()));
        }
        if let Some(email) = contact.email.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
            params.push((names.email.clone(), email.to_string()));
        }
        if let Some(phone) = contact.phone.as_deref().map(digits_only).filter(|v| !v.is_empty()) {
            params.push((names.phone.clone(), phone));
        }
        if let Some(tax_id) = contact.tax_id.as_deref().map(digits_only).filter(|v| !v.is_empty()) {
            params.push((names.tax_id.clone(), tax_id));
        }
        params
    }

    /// 旗標直接從加購 id 重新推導，不沿用解析結果
    pub fn flag_params<I, S>(&self, add_on_ids: I) -> Vec<(String, String)>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        AddOnFlags::from_ids(add_on_ids)
            .normalized()
            .query_pairs()
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    /// 路徑只當作路徑段處理；含 `?` 或 `#` 的路徑直接拒絕，不會被編碼成壞掉的連結
    pub fn endpoint_url(&self, endpoint_path: &str) -> Result<Url> {
        if endpoint_path.contains(['?', '#']) {
            return Err(CheckoutError::InvalidConfigValueError {
                field: format!("providers.{}.endpoints", self.provider_name),
                value: endpoint_path.to_string(),
                reason: "Endpoint paths cannot carry a query string or fragment".to_string(),
            });
        }

        let base = Url::parse(&self.provider.base_url).map_err(|e| CheckoutError::InvalidConfigValueError {
            field: format!("providers.{}.base_url", self.provider_name),
            value: self.provider.base_url.clone(),
            reason: format!("Invalid URL format: {}", e),
        })?;

        let mut url = base;
        {
            let mut segments = url.path_segments_mut().map_err(|_| CheckoutError::InvalidConfigValueError {
                field: format!("providers.{}.base_url", self.provider_name),
                value: self.provider.base_url.clone(),
                reason: "Base URL cannot carry a path".to_string(),
            })?;
            segments.pop_if_empty();
            for segment in endpoint_path.split('/').filter(|s| !s.is_empty()) {
                segments.push(segment);
            }
        }
        Ok(url)
    }

    /// 最終的導向網址
    pub fn build_checkout_url(
        &self,
        endpoint_path: &str,
        add_on_ids: &[String],
        attribution: &AttributionSnapshot,
        contact: &Contact,
    ) -> Result<Url> {
        let mut url = self.endpoint_url(endpoint_path)?;
        {
            let mut query = url.query_pairs_mut();
            query.extend_pairs(self.customer_params(contact));
            query.extend_pairs(self.flag_params(add_on_ids));
            query.extend_pairs(attribution.query_pairs());
        }
        Ok(url)
    }
}

/// 一次完成：解析端點、組出 mapping
pub fn endpoint_mapping(
    config: &CommerceConfig,
    route: &RegionRoute,
    selection: &Selection,
    attribution: &AttributionSnapshot,
) -> Result<EndpointMapping> {
    let (endpoint, path): (EndpointId, &str) =
        EndpointResolver::new(config).resolve(&route.provider, &selection.add_ons)?;
    let builder = CheckoutUrlBuilder::for_route(config, route)?;

    Ok(EndpointMapping {
        product_id: config.product.id.clone(),
        provider: route.provider.clone(),
        selected_add_on_ids: selection.add_ons.ids(),
        resolved_endpoint_id: endpoint,
        endpoint_path: path.to_string(),
        attribution_params: attribution.query_pairs(),
        customer_params: builder.customer_params(&selection.contact),
    })
}

/// 由 selection 直接組出結帳網址
pub fn build_checkout_url(
    config: &CommerceConfig,
    route: &RegionRoute,
    selection: &Selection,
    attribution: &AttributionSnapshot,
) -> Result<Url> {
    let mapping = endpoint_mapping(config, route, selection, attribution)?;
    let url = CheckoutUrlBuilder::for_route(config, route)?.build_checkout_url(
        &mapping.endpoint_path,
        &mapping.selected_add_on_ids,
        attribution,
        &selection.contact,
    )?;
    tracing::info!(
        "🔗 Checkout URL built for {} via {} ({})",
        mapping.product_id,
        mapping.provider,
        mapping.resolved_endpoint_id
    );
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::region::RegionRouter;
    use crate::domain::catalog::AddOn;
    use crate::domain::model::SelectionDelta;
    use serde_json::json;
    use std::collections::HashMap;

    fn query_map(url: &Url) -> HashMap<String, String> {
        url.query_pairs().into_owned().collect()
    }

    fn selection(delta: SelectionDelta) -> Selection {
        Selection::default().merged(delta).unwrap()
    }

    #[test]
    fn test_digits_only() {
        assert_eq!(digits_only("+55 (11) 98765-4321"), "5511987654321");
        assert_eq!(digits_only("123.456.789-09"), "12345678909");
        assert_eq!(digits_only("n/a"), "");
    }

    #[test]
    fn test_pt_checkout_url_carries_contact_flags_and_attribution() {
        let config = CommerceConfig::builtin().unwrap();
        let route = RegionRouter::new(&config).route("pt").unwrap();
        let selection = selection(
            SelectionDelta::new()
                .region("pt")
                .recipients(2)
                .add_ons(["4k-quality", "fast-delivery"])
                .name("Ana Souza")
                .email("ana@example.com")
                .phone("+55 (11) 98765-4321")
                .tax_id("123.456.789-09"),
        );
        let attribution = AttributionSnapshot::from_entries([
            ("utm_source", json!("instagram")),
            ("utm_campaign", json!("natal")),
        ]);

        let url = build_checkout_url(&config, &route, &selection, &attribution).unwrap();
        assert_eq!(url.host_str(), Some("pay.hotmart.com"));
        assert_eq!(url.path(), "/V90412345F");

        let query = query_map(&url);
        assert_eq!(query["name"], "Ana Souza");
        assert_eq!(query["email"], "ana@example.com");
        assert_eq!(query["phonenumber"], "5511987654321");
        assert_eq!(query["doc"], "12345678909");
        assert_eq!(query["addon_4k_quality"], "true");
        assert_eq!(query["addon_fast_delivery"], "true");
        assert_eq!(query["addon_bonus_scene"], "false");
        assert_eq!(query["addon_combo"], "false");
        assert_eq!(query["utm_source"], "instagram");
        assert_eq!(query["utm_campaign"], "natal");
    }

    #[test]
    fn test_absent_customer_fields_are_omitted() {
        let config = CommerceConfig::builtin().unwrap();
        let route = RegionRouter::new(&config).route("en").unwrap();
        let selection = selection(SelectionDelta::new().email("joe@example.com").phone("--"));

        let url = build_checkout_url(&config, &route, &selection, &AttributionSnapshot::new()).unwrap();
        let query = query_map(&url);

        assert_eq!(query["prefilled_email"], "joe@example.com");
        assert!(!query.contains_key("prefilled_name"));
        assert!(!query.contains_key("prefilled_phone"));
        assert!(!query.contains_key("client_tax_id"));
        assert!(!url.as_str().contains("=&"));
    }

    #[test]
    fn test_bad_attribution_entries_are_skipped() {
        let config = CommerceConfig::builtin().unwrap();
        let route = RegionRouter::new(&config).route("en").unwrap();
        let attribution = AttributionSnapshot::from_entries([
            ("utm_source", json!("google")),
            ("gclid", json!(null)),
            ("utm_term", json!(0)),
            ("fbclid", json!("")),
        ]);

        let url = build_checkout_url(&config, &route, &Selection::default(), &attribution).unwrap();
        let query = query_map(&url);

        assert_eq!(query["utm_source"], "google");
        assert!(!query.contains_key("gclid"));
        assert!(!query.contains_key("utm_term"));
        assert!(!query.contains_key("fbclid"));
    }

    #[test]
    fn test_bundle_sets_every_flag() {
        let config = CommerceConfig::builtin().unwrap();
        let route = RegionRouter::new(&config).route("pt").unwrap();
        let selection = selection(SelectionDelta::new().region("pt").add_ons(["combo-addons"]));

        let url = build_checkout_url(&config, &route, &selection, &AttributionSnapshot::new()).unwrap();
        assert_eq!(url.path(), "/V90412345J");
        let flags = AddOnFlags::from_query(&url);
        assert!(flags.combo && flags.four_k_quality && flags.fast_delivery && flags.bonus_scene);
    }

    #[test]
    fn test_base_url_with_path_prefix() {
        let mut config = CommerceConfig::builtin().unwrap();
        config.providers.get_mut("stripe").unwrap().base_url = "https://shop.example.com/checkout/".to_string();
        let provider = config.provider("stripe").unwrap();
        let builder = CheckoutUrlBuilder::new("stripe", provider);

        let url = builder.endpoint_url("offer/abc").unwrap();
        assert_eq!(url.as_str(), "https://shop.example.com/checkout/offer/abc");
    }

    #[test]
    fn test_flags_round_trip_for_every_endpoint() {
        let config = CommerceConfig::builtin().unwrap();
        for locale in ["pt", "en"] {
            let route = RegionRouter::new(&config).route(locale).unwrap();
            let provider = config.provider(&route.provider).unwrap();

            for endpoint in EndpointId::ALL {
                let flags = endpoint.flags();
                let ids: Vec<&str> = if flags.combo {
                    vec![AddOn::Combo.id()]
                } else {
                    AddOn::INDIVIDUALS.iter().filter(|a| flags.get(**a)).map(|a| a.id()).collect()
                };
                let selection = selection(SelectionDelta::new().region(locale).add_ons(ids));

                let url = build_checkout_url(&config, &route, &selection, &AttributionSnapshot::new()).unwrap();
                assert_eq!(
                    url.path().trim_start_matches('/'),
                    provider.endpoint_path(endpoint).unwrap(),
                    "{} on {}",
                    endpoint,
                    route.provider
                );
                assert_eq!(AddOnFlags::from_query(&url), flags, "{} on {}", endpoint, route.provider);
            }
        }
    }

    #[test]
    fn test_builder_composes_url_from_parts() {
        let config = CommerceConfig::builtin().unwrap();
        let builder = CheckoutUrlBuilder::new("hotmart", config.provider("hotmart").unwrap());
        let contact = Contact {
            name: Some("Ana".to_string()),
            phone: Some("(11) 5555-0000".to_string()),
            ..Contact::default()
        };
        let attribution = AttributionSnapshot::from_entries([("sck", json!("bio"))]);

        let url = builder
            .build_checkout_url(
                "V90412345C",
                &["4k-quality".to_string()],
                &attribution,
                &contact,
            )
            .unwrap();

        assert_eq!(
            url.as_str(),
            "https://pay.hotmart.com/V90412345C?name=Ana&phonenumber=1155550000\
             &addon_4k_quality=true&addon_fast_delivery=false&addon_bonus_scene=false&addon_combo=false\
             &sck=bio"
        );
    }

    #[test]
    fn test_endpoint_path_with_query_is_rejected() {
        let config = CommerceConfig::builtin().unwrap();
        let builder = CheckoutUrlBuilder::new("hotmart", config.provider("hotmart").unwrap());

        let err = builder.endpoint_url("V90412345C?off=abc123").unwrap_err();
        assert!(matches!(err, CheckoutError::InvalidConfigValueError { .. }));
        assert!(builder.endpoint_url("V90412345C#offer").is_err());
    }

    #[test]
    fn test_mapping_records_resolved_endpoint() {
        let config = CommerceConfig::builtin().unwrap();
        let route = RegionRouter::new(&config).route("en").unwrap();
        let selection = selection(SelectionDelta::new().add_ons(["bonus-scene"]).name("Joe"));

        let mapping = endpoint_mapping(&config, &route, &selection, &AttributionSnapshot::new()).unwrap();
        assert_eq!(mapping.product_id, "personalized-video");
        assert_eq!(mapping.resolved_endpoint_id, EndpointId::WithBonusScene);
        assert_eq!(mapping.endpoint_path, "14k5nT0aA3bH");
        assert_eq!(
            mapping.customer_params,
            vec![("prefilled_name".to_string(), "Joe".to_string())]
        );
    }
}
