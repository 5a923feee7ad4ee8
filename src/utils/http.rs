use reqwest::{Client, Proxy};

use crate::models::config::{HttpConfig, UpstreamProxyConfig};

pub const USER_AGENT: &str = concat!("photo-relay/", env!("CARGO_PKG_VERSION"));

/// 创建统一配置的 HTTP 客户端
pub fn create_client(config: &HttpConfig) -> Client {
    create_client_with_proxy(config.timeout_secs, Some(&config.upstream_proxy))
}

/// 创建带指定代理配置的 HTTP 客户端
pub fn create_client_with_proxy(timeout_secs: u64, proxy_config: Option<&UpstreamProxyConfig>) -> Client {
    let mut builder = Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .user_agent(USER_AGENT);

    if let Some(config) = proxy_config {
        if config.enabled && !config.url.is_empty() {
            match Proxy::all(&config.url) {
                Ok(proxy) => {
                    builder = builder.proxy(proxy);
                    tracing::info!("HTTP 客户端已启用上游代理: {}", config.url);
                }
                Err(e) => {
                    tracing::error!("无效的代理地址: {}, 错误: {}", config.url, e);
                }
            }
        }
    }

    builder.build().unwrap_or_else(|_| Client::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_proxy_falls_back() {
        let proxy = UpstreamProxyConfig {
            enabled: true,
            url: "::not a url::".to_string(),
        };
        // 无效代理仅记录错误，仍然返回可用的客户端
        let _client = create_client_with_proxy(5, Some(&proxy));
    }
}
