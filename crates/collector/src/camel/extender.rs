//! 익스체인지 보강
//!
//! [`DefaultExchangeExtender`]는 익스체인지의 문맥 정보를 속성 맵에 추가합니다.
//! 사용자 정의 [`ExchangeExtender`]는 기본 보강 이후에 실행됩니다.

use decanter_core::event::{Attributes, render_value};
use serde_json::Value;

use super::types::{Exchange, Message};
use crate::error::CollectorError;

/// `causedByException`의 대체 출처가 되는 익스체인지 속성
pub const EXCEPTION_CAUGHT_PROPERTY: &str = "CamelExceptionCaught";

/// 익스체인지 보강 trait
pub trait ExchangeExtender: Send + Sync {
    /// 익스체인지 정보를 속성 맵에 추가합니다.
    ///
    /// 에러를 반환하면 해당 이벤트는 로그를 남기고 버려집니다.
    fn extend(&self, attributes: &mut Attributes, exchange: &Exchange) -> Result<(), CollectorError>;
}

/// 기본 익스체인지 보강기
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DefaultExchangeExtender {
    pub include_properties: bool,
    pub include_headers: bool,
    pub include_body: bool,
}

impl Default for DefaultExchangeExtender {
    fn default() -> Self {
        Self {
            include_properties: true,
            include_headers: true,
            include_body: true,
        }
    }
}

impl DefaultExchangeExtender {
    fn put(attributes: &mut Attributes, key: &str, value: impl Into<Value>) {
        attributes.insert(key.to_owned(), value.into());
    }

    fn put_message(&self, attributes: &mut Attributes, prefix: &str, message: &Message) {
        if self.include_headers {
            Self::put(
                attributes,
                &format!("{prefix}Headers"),
                Value::Object(message.headers.clone()),
            );
        }
        if self.include_body {
            let body = message.body.as_ref().map(|body| render_value(&body.value));
            Self::put(attributes, &format!("{prefix}Body"), body);
        }
        let body_type = message.body.as_ref().map(|body| body.type_name.clone());
        Self::put(attributes, &format!("{prefix}BodyType"), body_type);
    }

    fn previous_node(exchange: &Exchange) -> Option<&str> {
        let nodes = exchange.traced_nodes.as_ref()?;
        nodes.len().checked_sub(2).map(|idx| nodes[idx].as_str())
    }

    fn to_node(exchange: &Exchange) -> Option<&str> {
        exchange.traced_nodes.as_ref()?.last().map(String::as_str)
    }

    fn short_exchange_id(exchange_id: &str) -> &str {
        exchange_id
            .split_once('/')
            .map_or(exchange_id, |(_, rest)| rest)
    }

    fn caused_by(exchange: &Exchange) -> Option<String> {
        exchange.exception.clone().or_else(|| {
            exchange
                .properties
                .get(EXCEPTION_CAUGHT_PROPERTY)
                .filter(|value| !value.is_null())
                .map(render_value)
        })
    }
}

impl ExchangeExtender for DefaultExchangeExtender {
    fn extend(&self, attributes: &mut Attributes, exchange: &Exchange) -> Result<(), CollectorError> {
        Self::put(attributes, "fromEndpointUri", exchange.from_endpoint_uri.clone());
        Self::put(attributes, "previousNode", Self::previous_node(exchange));
        Self::put(attributes, "toNode", Self::to_node(exchange));
        Self::put(attributes, "exchangeId", exchange.exchange_id.as_str());
        Self::put(attributes, "routeId", exchange.from_route_id.clone());
        Self::put(attributes, "camelContextName", exchange.context_name.as_str());
        Self::put(
            attributes,
            "shortExchangeId",
            Self::short_exchange_id(&exchange.exchange_id),
        );
        Self::put(attributes, "exchangePattern", exchange.pattern.to_string());

        if self.include_properties {
            Self::put(attributes, "properties", Value::Object(exchange.properties.clone()));
        }
        self.put_message(attributes, "in", &exchange.in_message);
        if let Some(out) = &exchange.out_message {
            self.put_message(attributes, "out", out);
        }

        Self::put(attributes, "causedByException", Self::caused_by(exchange));
        Ok(())
    }
}
