// SPDX-License-Identifier: MIT OR Apache-2.0
//! The Request Processor (§4.9): validates, authorizes, and dispatches
//! every incoming JSON request against a [`BrokerContext`], producing the
//! uniform response/error envelope defined in §6/§7.

mod session;

use std::sync::Arc;

use serde_json::Value as JsonValue;
use uuid::Uuid;

use vss_auth::Authenticator;
use vss_error::BrokerError;
use vss_path::Path;
use vss_protocol::{
    request_id_to_string, ErrorResponse, Request, RequestValidator, Response, SignalData,
};
use vss_subscriptions::{Attribute as SubAttribute, PublishJob, PublisherLoop, Republisher, Sink, SubscriptionRegistry};
use vss_tree::SignalTree;
use vss_types::{Attribute, Timestamp};

pub use session::SessionState;

/// The broker's shared, long-lived state: the tree, the authenticator, the
/// subscription machinery, and the request validator. Constructed once at
/// startup (§9 design note: "replace singletons with an explicit broker
/// context passed by handle").
pub struct BrokerContext {
    pub tree: Arc<SignalTree>,
    pub authenticator: Arc<Authenticator>,
    pub subscriptions: Arc<SubscriptionRegistry>,
    pub publisher: Arc<PublisherLoop>,
    pub validator: Arc<RequestValidator>,
}

impl BrokerContext {
    pub fn new(tree: Arc<SignalTree>, authenticator: Arc<Authenticator>, republisher: Arc<dyn Republisher>) -> Self {
        let subscriptions = Arc::new(SubscriptionRegistry::new());
        let publisher = Arc::new(PublisherLoop::spawn(Arc::clone(&subscriptions), republisher));
        BrokerContext {
            tree,
            authenticator,
            subscriptions,
            publisher,
            validator: Arc::new(RequestValidator::new()),
        }
    }
}

/// Stateless request dispatcher: every call takes the session and sink it
/// needs as arguments, so one processor instance serves every connection.
pub struct RequestProcessor {
    ctx: Arc<BrokerContext>,
}

impl RequestProcessor {
    pub fn new(ctx: Arc<BrokerContext>) -> Self {
        RequestProcessor { ctx }
    }

    /// Handle one raw JSON request for `session`, returning the raw JSON
    /// response or error envelope to send back on the same connection.
    ///
    /// `sink` is only consulted for `subscribe`; pass any [`Sink`] for
    /// requests that can't possibly need it.
    pub fn handle(&self, session: &SessionState, sink: &Arc<dyn Sink>, raw: &JsonValue) -> JsonValue {
        let request_id = vss_protocol::extract_request_id(raw);
        let action_for_errors = raw
            .get("action")
            .and_then(JsonValue::as_str)
            .unwrap_or("unknown")
            .to_string();

        let request = match self.ctx.validator.parse(raw) {
            Ok(req) => req,
            Err(err) => return error_envelope(&action_for_errors, request_id, &err),
        };

        let result = self.dispatch(session, sink, &request);
        match result {
            Ok(response) => serde_json::to_value(response).expect("response serializes"),
            Err(err) => {
                tracing::warn!(action = %request.action_name(), error = %err, "request failed");
                error_envelope(request.action_name(), request.request_id().cloned(), &err)
            }
        }
    }

    fn dispatch(
        &self,
        session: &SessionState,
        sink: &Arc<dyn Sink>,
        request: &Request,
    ) -> Result<Response, BrokerError> {
        match request {
            Request::Authorize { request_id, token } => self.handle_authorize(session, request_id.clone(), token),
            Request::Get {
                request_id,
                path,
                attribute,
            } => self.handle_get(session, request_id.clone(), path, attribute.as_deref()),
            Request::Set {
                request_id,
                path,
                value,
                attribute,
            } => self.handle_set(session, request_id.clone(), path, value, attribute.as_deref()),
            Request::Subscribe {
                request_id,
                path,
                attribute,
                filters: _,
            } => self.handle_subscribe(session, sink, request_id.clone(), path, attribute.as_deref()),
            Request::Unsubscribe {
                request_id,
                subscription_id,
            } => self.handle_unsubscribe(request_id.clone(), subscription_id),
            Request::GetMetaData { request_id, path } => self.handle_get_metadata(request_id.clone(), path),
            Request::UpdateMetaData {
                request_id,
                path,
                metadata,
            } => self.handle_update_metadata(session, request_id.clone(), path, metadata),
            Request::UpdateVssTree { request_id, tree } => {
                self.handle_update_vss_tree(session, request_id.clone(), tree)
            }
        }
    }

    fn handle_authorize(
        &self,
        session: &SessionState,
        request_id: Option<JsonValue>,
        token: &str,
    ) -> Result<Response, BrokerError> {
        let auth = self.ctx.authenticator.validate(token)?;
        let ttl = auth.expires_at - now_unix();
        session.install(auth);
        Ok(Response::Authorize {
            request_id,
            ts: Timestamp::now().to_iso8601(),
            ttl: Some(ttl),
        })
    }

    fn handle_get(
        &self,
        session: &SessionState,
        request_id: Option<JsonValue>,
        path_str: &str,
        attribute: Option<&str>,
    ) -> Result<Response, BrokerError> {
        let path = Path::parse(path_str)?;
        let attribute = parse_attribute(attribute)?;
        let leaves = self.ctx.tree.leaves_matching(&path);
        if leaves.is_empty() {
            return Err(BrokerError::PathNotFound(path.render()));
        }

        let is_wildcard = path.has_wildcard();
        let mut denied = false;
        let mut collected = Vec::new();
        for leaf in &leaves {
            let allowed = session.permission(leaf).is_some_and(|a| a.allows_read());
            if !allowed {
                denied = true;
                continue;
            }
            if let Ok(reading) = self.ctx.tree.get_signal(leaf, attribute) {
                if let Some(dp) = reading.datapoint {
                    collected.push(SignalData {
                        path: leaf.render(),
                        dp: vss_protocol::DatapointWire::from_datapoint(&dp, true),
                    });
                }
            }
        }

        if collected.is_empty() {
            if denied && !is_wildcard {
                return Err(BrokerError::NoPermission(path.render()));
            }
            return Err(BrokerError::UnavailableData(path.render()));
        }

        let data = if is_wildcard || collected.len() > 1 {
            serde_json::to_value(&collected).expect("signal data array serializes")
        } else {
            serde_json::to_value(&collected[0]).expect("signal data serializes")
        };

        Ok(Response::Get {
            request_id,
            ts: Timestamp::now().to_iso8601(),
            data,
        })
    }

    fn handle_set(
        &self,
        session: &SessionState,
        request_id: Option<JsonValue>,
        path_str: &str,
        value: &JsonValue,
        attribute: Option<&str>,
    ) -> Result<Response, BrokerError> {
        let path = Path::parse(path_str)?;
        let attribute = parse_attribute(attribute)?;

        if !self.ctx.tree.exists(&path) {
            return Err(BrokerError::PathNotFound(path.render()));
        }
        match attribute {
            Attribute::Value if !self.ctx.tree.is_writable(&path) => {
                return Err(BrokerError::NotWritable(path.render()));
            }
            Attribute::Target if !self.ctx.tree.is_attributable(&path, Attribute::Target) => {
                return Err(BrokerError::NotAttributable { path: path.render() });
            }
            _ => {}
        }
        if !session.permission(&path).is_some_and(|a| a.allows_write()) {
            return Err(BrokerError::NoPermission(path.render()));
        }

        let datapoint = self.ctx.tree.set_signal(&path, attribute, value)?;
        self.ctx.publisher.publish(PublishJob {
            path: path.clone(),
            attribute: to_sub_attribute(attribute),
            datapoint,
        });

        Ok(Response::Set {
            request_id,
            ts: Timestamp::now().to_iso8601(),
        })
    }

    fn handle_subscribe(
        &self,
        session: &SessionState,
        sink: &Arc<dyn Sink>,
        request_id: Option<JsonValue>,
        path_str: &str,
        attribute: Option<&str>,
    ) -> Result<Response, BrokerError> {
        let path = Path::parse(path_str)?;
        let attribute = parse_attribute(attribute)?;

        if !self.ctx.tree.exists(&path) {
            return Err(BrokerError::PathNotFound(path.render()));
        }
        if !self.ctx.tree.is_readable(&path) {
            return Err(BrokerError::NotReadable(path.render()));
        }
        if !session.permission(&path).is_some_and(|a| a.allows_read()) {
            return Err(BrokerError::NoPermission(path.render()));
        }

        let id = self.ctx.subscriptions.subscribe(
            path,
            to_sub_attribute(attribute),
            Arc::clone(sink),
            session.connection_id().to_string(),
        );

        Ok(Response::Subscribe {
            request_id,
            ts: Timestamp::now().to_iso8601(),
            subscription_id: id.to_string(),
        })
    }

    fn handle_unsubscribe(
        &self,
        request_id: Option<JsonValue>,
        subscription_id: &str,
    ) -> Result<Response, BrokerError> {
        let id = Uuid::parse_str(subscription_id)
            .map_err(|e| BrokerError::BadRequest(format!("malformed subscriptionId: {e}")))?;
        self.ctx.subscriptions.unsubscribe(id)?;
        Ok(Response::Unsubscribe {
            request_id,
            ts: Timestamp::now().to_iso8601(),
            subscription_id: subscription_id.to_string(),
        })
    }

    fn handle_get_metadata(
        &self,
        request_id: Option<JsonValue>,
        path_str: &str,
    ) -> Result<Response, BrokerError> {
        let path = Path::parse(path_str)?;
        let metadata = self.ctx.tree.get_metadata_tree(&path)?;
        Ok(Response::GetMetaData {
            request_id,
            ts: Timestamp::now().to_iso8601(),
            metadata,
        })
    }

    fn handle_update_metadata(
        &self,
        session: &SessionState,
        request_id: Option<JsonValue>,
        path_str: &str,
        metadata: &JsonValue,
    ) -> Result<Response, BrokerError> {
        if !session.modify_tree_capability() {
            return Err(BrokerError::NoPermission(
                "session lacks modify-tree capability".into(),
            ));
        }
        let path = Path::parse(path_str)?;
        self.ctx.tree.update_metadata(&path, metadata)?;
        Ok(Response::UpdateMetaData {
            request_id,
            ts: Timestamp::now().to_iso8601(),
        })
    }

    fn handle_update_vss_tree(
        &self,
        session: &SessionState,
        request_id: Option<JsonValue>,
        tree: &JsonValue,
    ) -> Result<Response, BrokerError> {
        if !session.modify_tree_capability() {
            return Err(BrokerError::NoPermission(
                "session lacks modify-tree capability".into(),
            ));
        }
        self.ctx.tree.update_vss_tree(tree)?;
        Ok(Response::UpdateVssTree {
            request_id,
            ts: Timestamp::now().to_iso8601(),
        })
    }

    /// Close out a transport connection: tear down every subscription it
    /// owned (§3: "closing a session unregisters all of its
    /// subscriptions").
    pub fn close_session(&self, session: &SessionState) {
        let removed = self.ctx.subscriptions.unsubscribe_all(session.connection_id());
        if removed > 0 {
            tracing::debug!(connection = session.connection_id(), removed, "tore down session subscriptions");
        }
    }
}

fn parse_attribute(raw: Option<&str>) -> Result<Attribute, BrokerError> {
    match raw {
        None => Ok(Attribute::Value),
        Some(tag) => Attribute::parse(tag)
            .ok_or_else(|| BrokerError::BadRequest(format!("unknown attribute '{tag}'"))),
    }
}

fn to_sub_attribute(attribute: Attribute) -> SubAttribute {
    match attribute {
        Attribute::Value => SubAttribute::Value,
        Attribute::Target => SubAttribute::Target,
    }
}

fn now_unix() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

/// Build the uniform error envelope (§7), falling back to the literal
/// `"UNKNOWN"` request id when none could be extracted from the raw
/// request (§6).
fn error_envelope(action: &str, request_id: Option<JsonValue>, err: &BrokerError) -> JsonValue {
    let echoed = match request_id {
        Some(raw) => Some(
            request_id_to_string(&raw)
                .map(JsonValue::String)
                .unwrap_or(JsonValue::String("UNKNOWN".to_string())),
        ),
        None => Some(JsonValue::String("UNKNOWN".to_string())),
    };
    serde_json::to_value(ErrorResponse::new(action, echoed, err)).expect("error envelope serializes")
}
