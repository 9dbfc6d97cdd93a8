use std::collections::HashMap;

use meshroute_base::Url;

/// Flattens a url into one key-value view: address fields first, then the
/// url's own params (params win on collision). Rule label matchers run
/// against this view.
pub fn to_param_map(url: &Url) -> HashMap<String, String> {
    let mut result: HashMap<String, String> = HashMap::new();
    result.insert("scheme".to_string(), url.scheme.clone());
    result.insert("host".to_string(), url.host.clone());
    result.insert("port".to_string(), url.port.to_string());
    result.insert("service_name".to_string(), url.service_name.clone());
    for (key, value) in &url.params {
        result.insert(key.clone(), value.clone());
    }
    result
}
