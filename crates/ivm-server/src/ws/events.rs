//! Domain event dispatch.
//!
//! REST handlers report "entity X changed" through [`EventDispatcher`]; each
//! event kind has a fixed delivery policy resolved by
//! [`RealtimeEvent::targets`]. Dispatch is fire and forget: nothing here
//! returns an error to the caller of [`EventDispatcher::trigger_event`].

use ivm_protocol::{
    Audience, Company, EntityId, Envelope, EventKind, Investment, Investor, InvestorActivity, Role,
    RoomId, User,
};
use serde::Deserialize;
use serde_json::Value;

/// Delivery surface the dispatcher writes to. Each call returns the number
/// of sockets the envelope was queued on.
pub trait EventSink: Send + Sync {
    fn send_to_user(&self, user_id: &EntityId, envelope: &Envelope) -> usize;
    fn send_to_room(&self, room: &RoomId, envelope: &Envelope) -> usize;
    fn broadcast(&self, envelope: &Envelope) -> usize;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Room(RoomId),
    User(EntityId),
    Everyone,
}

/// Caller-supplied delivery options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventOptions {
    /// Audience of analytics and system events; defaults to everyone.
    #[serde(default)]
    pub target_role: Option<Audience>,
}

#[derive(Debug, thiserror::Error)]
pub enum EventError {
    #[error("unknown event type `{0}`")]
    UnknownEvent(String),
    #[error("invalid payload for `{event}`: {source}")]
    InvalidPayload {
        event: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum RealtimeEvent {
    InvestmentCreated(Investment),
    InvestmentUpdated(Investment),
    InvestmentDeleted(Investment),
    NewInvestor(InvestorActivity),
    InvestmentApproved(InvestorActivity),
    UserCreated(User),
    UserUpdated(User),
    UserDeleted(User),
    CompanyCreated(Company),
    CompanyUpdated(Company),
    AnalyticsUpdated(Value),
    PerformanceUpdated(Value),
    SystemMaintenance(Value),
    SystemAlert(Value),
}

impl RealtimeEvent {
    /// Decode the payload of a `category.action` event.
    pub fn parse(event_type: &str, data: Value) -> Result<Self, EventError> {
        let kind = EventKind::parse(event_type)
            .ok_or_else(|| EventError::UnknownEvent(event_type.to_string()))?;
        Self::from_kind(kind, data)
    }

    pub fn from_kind(kind: EventKind, data: Value) -> Result<Self, EventError> {
        let invalid = |source| EventError::InvalidPayload {
            event: kind.name(),
            source,
        };
        let event = match kind {
            EventKind::InvestmentCreated => {
                Self::InvestmentCreated(serde_json::from_value(data).map_err(invalid)?)
            }
            EventKind::InvestmentUpdated => {
                Self::InvestmentUpdated(serde_json::from_value(data).map_err(invalid)?)
            }
            EventKind::InvestmentDeleted => {
                Self::InvestmentDeleted(serde_json::from_value(data).map_err(invalid)?)
            }
            EventKind::InvestmentNewInvestor => {
                Self::NewInvestor(serde_json::from_value(data).map_err(invalid)?)
            }
            EventKind::InvestmentApproved => {
                Self::InvestmentApproved(serde_json::from_value(data).map_err(invalid)?)
            }
            EventKind::UserCreated => Self::UserCreated(serde_json::from_value(data).map_err(invalid)?),
            EventKind::UserUpdated => Self::UserUpdated(serde_json::from_value(data).map_err(invalid)?),
            EventKind::UserDeleted => Self::UserDeleted(serde_json::from_value(data).map_err(invalid)?),
            EventKind::CompanyCreated => {
                Self::CompanyCreated(serde_json::from_value(data).map_err(invalid)?)
            }
            EventKind::CompanyUpdated => {
                Self::CompanyUpdated(serde_json::from_value(data).map_err(invalid)?)
            }
            EventKind::AnalyticsUpdated => Self::AnalyticsUpdated(data),
            EventKind::AnalyticsPerformanceUpdated => Self::PerformanceUpdated(data),
            EventKind::SystemMaintenance => Self::SystemMaintenance(data),
            EventKind::SystemAlert => Self::SystemAlert(data),
        };
        Ok(event)
    }

    pub fn kind(&self) -> EventKind {
        match self {
            Self::InvestmentCreated(_) => EventKind::InvestmentCreated,
            Self::InvestmentUpdated(_) => EventKind::InvestmentUpdated,
            Self::InvestmentDeleted(_) => EventKind::InvestmentDeleted,
            Self::NewInvestor(_) => EventKind::InvestmentNewInvestor,
            Self::InvestmentApproved(_) => EventKind::InvestmentApproved,
            Self::UserCreated(_) => EventKind::UserCreated,
            Self::UserUpdated(_) => EventKind::UserUpdated,
            Self::UserDeleted(_) => EventKind::UserDeleted,
            Self::CompanyCreated(_) => EventKind::CompanyCreated,
            Self::CompanyUpdated(_) => EventKind::CompanyUpdated,
            Self::AnalyticsUpdated(_) => EventKind::AnalyticsUpdated,
            Self::PerformanceUpdated(_) => EventKind::AnalyticsPerformanceUpdated,
            Self::SystemMaintenance(_) => EventKind::SystemMaintenance,
            Self::SystemAlert(_) => EventKind::SystemAlert,
        }
    }

    /// The `data` field of the outgoing envelope.
    pub fn payload(&self) -> Result<Value, serde_json::Error> {
        match self {
            Self::InvestmentCreated(inv) | Self::InvestmentUpdated(inv) | Self::InvestmentDeleted(inv) => {
                serde_json::to_value(inv)
            }
            Self::NewInvestor(activity) | Self::InvestmentApproved(activity) => {
                serde_json::to_value(activity)
            }
            Self::UserCreated(user) | Self::UserUpdated(user) | Self::UserDeleted(user) => {
                serde_json::to_value(user)
            }
            Self::CompanyCreated(company) | Self::CompanyUpdated(company) => {
                serde_json::to_value(company)
            }
            Self::AnalyticsUpdated(data)
            | Self::PerformanceUpdated(data)
            | Self::SystemMaintenance(data)
            | Self::SystemAlert(data) => Ok(data.clone()),
        }
    }

    /// Delivery policy, in send order.
    pub fn targets(&self, options: &EventOptions) -> Vec<Target> {
        let role = |r| Target::Room(RoomId::for_role(r));
        let company_admins = |inv: &Investment| {
            inv.sub_company_id
                .as_ref()
                .map(|id| Target::Room(RoomId::company_admins(id)))
        };

        match self {
            Self::InvestmentCreated(inv) | Self::InvestmentDeleted(inv) => {
                let mut targets = vec![role(Role::SuperAdmin)];
                targets.extend(company_admins(inv));
                targets.push(role(Role::Investor));
                targets
            }
            Self::InvestmentUpdated(inv) => {
                let mut targets = vec![role(Role::SuperAdmin)];
                targets.extend(company_admins(inv));
                targets
            }
            Self::NewInvestor(activity) => vec![
                role(Role::SuperAdmin),
                role(Role::Admin),
                Target::User(activity.investor.user_id.clone()),
            ],
            Self::InvestmentApproved(activity) => vec![
                Target::User(activity.investor.user_id.clone()),
                role(Role::Admin),
                role(Role::SuperAdmin),
            ],
            Self::UserCreated(_) | Self::UserDeleted(_) => {
                vec![role(Role::Admin), role(Role::SuperAdmin)]
            }
            Self::UserUpdated(user) => vec![
                role(Role::Admin),
                role(Role::SuperAdmin),
                Target::User(user.id.clone()),
            ],
            Self::CompanyCreated(_) => vec![role(Role::SuperAdmin)],
            Self::CompanyUpdated(company) => {
                let mut targets = vec![role(Role::SuperAdmin)];
                targets.extend(company.admin_id.clone().map(Target::User));
                targets
            }
            Self::AnalyticsUpdated(_)
            | Self::PerformanceUpdated(_)
            | Self::SystemMaintenance(_)
            | Self::SystemAlert(_) => match options.target_role.unwrap_or_default() {
                Audience::All => vec![Target::Everyone],
                Audience::Role(r) => vec![role(r)],
            },
        }
    }
}

/// Entry point for collaborators. Cheap to construct; borrows the sink.
#[derive(Clone, Copy)]
pub struct EventDispatcher<'a> {
    sink: &'a dyn EventSink,
}

impl<'a> EventDispatcher<'a> {
    pub fn new(sink: &'a dyn EventSink) -> Self {
        Self { sink }
    }

    /// Deliver a typed event. Returns the number of sockets written.
    pub fn dispatch(&self, event: &RealtimeEvent, options: &EventOptions) -> usize {
        let kind = event.kind();
        let data = match event.payload() {
            Ok(data) => data,
            Err(e) => {
                tracing::error!(event = %kind, "Failed to serialize event payload: {}", e);
                return 0;
            }
        };
        let envelope = Envelope::new(kind.message_type(), data);

        let mut delivered = 0;
        for target in event.targets(options) {
            delivered += match &target {
                Target::Room(room) => self.sink.send_to_room(room, &envelope),
                Target::User(user_id) => self.sink.send_to_user(user_id, &envelope),
                Target::Everyone => self.sink.broadcast(&envelope),
            };
        }
        tracing::debug!(event = %kind, delivered, "Event dispatched");
        delivered
    }

    /// Decode and deliver, reporting unknown events and bad payloads.
    pub fn dispatch_raw(
        &self,
        event_type: &str,
        data: Value,
        options: &EventOptions,
    ) -> Result<usize, EventError> {
        let event = RealtimeEvent::parse(event_type, data)?;
        Ok(self.dispatch(&event, options))
    }

    /// Fire and forget: failures are logged and dropped.
    pub fn trigger_event(&self, event_type: &str, data: Value, options: &EventOptions) {
        if let Err(e) = self.dispatch_raw(event_type, data, options) {
            tracing::warn!(event_type, "Event not dispatched: {}", e);
        }
    }

    pub fn investments(&self) -> InvestmentEvents<'a> {
        InvestmentEvents(*self)
    }

    pub fn users(&self) -> UserEvents<'a> {
        UserEvents(*self)
    }

    pub fn companies(&self) -> CompanyEvents<'a> {
        CompanyEvents(*self)
    }

    pub fn analytics(&self) -> AnalyticsEvents<'a> {
        AnalyticsEvents(*self)
    }

    pub fn system(&self) -> SystemEvents<'a> {
        SystemEvents(*self)
    }

    fn send(&self, event: RealtimeEvent) -> usize {
        self.dispatch(&event, &EventOptions::default())
    }

    fn send_to(&self, event: RealtimeEvent, audience: Option<Audience>) -> usize {
        self.dispatch(
            &event,
            &EventOptions {
                target_role: audience,
            },
        )
    }
}

fn activity(investment: &Investment, investor: &Investor) -> InvestorActivity {
    InvestorActivity {
        investment: investment.clone(),
        investor: investor.clone(),
    }
}

pub struct InvestmentEvents<'a>(EventDispatcher<'a>);

impl InvestmentEvents<'_> {
    pub fn created(&self, investment: &Investment) -> usize {
        self.0.send(RealtimeEvent::InvestmentCreated(investment.clone()))
    }

    pub fn updated(&self, investment: &Investment) -> usize {
        self.0.send(RealtimeEvent::InvestmentUpdated(investment.clone()))
    }

    pub fn deleted(&self, investment: &Investment) -> usize {
        self.0.send(RealtimeEvent::InvestmentDeleted(investment.clone()))
    }

    pub fn new_investor(&self, investment: &Investment, investor: &Investor) -> usize {
        self.0
            .send(RealtimeEvent::NewInvestor(activity(investment, investor)))
    }

    pub fn approved(&self, investment: &Investment, investor: &Investor) -> usize {
        self.0
            .send(RealtimeEvent::InvestmentApproved(activity(investment, investor)))
    }
}

pub struct UserEvents<'a>(EventDispatcher<'a>);

impl UserEvents<'_> {
    pub fn created(&self, user: &User) -> usize {
        self.0.send(RealtimeEvent::UserCreated(user.clone()))
    }

    pub fn updated(&self, user: &User) -> usize {
        self.0.send(RealtimeEvent::UserUpdated(user.clone()))
    }

    pub fn deleted(&self, user: &User) -> usize {
        self.0.send(RealtimeEvent::UserDeleted(user.clone()))
    }
}

pub struct CompanyEvents<'a>(EventDispatcher<'a>);

impl CompanyEvents<'_> {
    pub fn created(&self, company: &Company) -> usize {
        self.0.send(RealtimeEvent::CompanyCreated(company.clone()))
    }

    pub fn updated(&self, company: &Company) -> usize {
        self.0.send(RealtimeEvent::CompanyUpdated(company.clone()))
    }
}

pub struct AnalyticsEvents<'a>(EventDispatcher<'a>);

impl AnalyticsEvents<'_> {
    pub fn updated(&self, data: Value, audience: Option<Audience>) -> usize {
        self.0.send_to(RealtimeEvent::AnalyticsUpdated(data), audience)
    }

    pub fn performance_updated(&self, data: Value, audience: Option<Audience>) -> usize {
        self.0.send_to(RealtimeEvent::PerformanceUpdated(data), audience)
    }
}

pub struct SystemEvents<'a>(EventDispatcher<'a>);

impl SystemEvents<'_> {
    pub fn maintenance(&self, data: Value, audience: Option<Audience>) -> usize {
        self.0.send_to(RealtimeEvent::SystemMaintenance(data), audience)
    }

    pub fn alert(&self, data: Value, audience: Option<Audience>) -> usize {
        self.0.send_to(RealtimeEvent::SystemAlert(data), audience)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{RecordingSink, Sent};
    use serde_json::json;

    const USER_OID: &str = "64f1c2a9e4b0a1b2c3d4e5f6";
    const COMPANY_OID: &str = "64f1c2a9e4b0a1b2c3d4e5f7";

    fn investment(sub_company: Option<&str>) -> Investment {
        serde_json::from_value(json!({
            "id": "inv-1",
            "name": "Harbor Fund",
            "subCompanyId": sub_company,
        }))
        .unwrap()
    }

    #[test]
    fn test_investment_created_with_sub_company() {
        let sink = RecordingSink::default();
        let sub = COMPANY_OID;
        let data = json!({ "id": "inv-1", "subCompanyId": sub });

        EventDispatcher::new(&sink).trigger_event(
            "investment.created",
            data,
            &EventOptions::default(),
        );

        assert_eq!(
            sink.rooms(),
            vec![
                "superadmin".to_string(),
                format!("admin_{sub}"),
                "investor".to_string()
            ]
        );
        for sent in sink.calls() {
            assert_eq!(sent.envelope().kind, "investment_created");
            assert_eq!(sent.envelope().data["id"], "inv-1");
        }
    }

    #[test]
    fn test_investment_created_without_sub_company() {
        let sink = RecordingSink::default();
        let dispatcher = EventDispatcher::new(&sink);
        dispatcher.trigger_event(
            "investment.created",
            json!({ "id": "inv-2" }),
            &EventOptions::default(),
        );
        assert_eq!(sink.rooms(), vec!["superadmin", "investor"]);

        let sink = RecordingSink::default();
        EventDispatcher::new(&sink).trigger_event(
            "investment.created",
            json!({ "id": "inv-3", "subCompanyId": null }),
            &EventOptions::default(),
        );
        assert_eq!(sink.rooms(), vec!["superadmin", "investor"]);
    }

    #[test]
    fn test_document_ids_are_routed() {
        let sink = RecordingSink::default();
        let dispatcher = EventDispatcher::new(&sink);

        let delivered = dispatcher
            .dispatch_raw(
                "investment.created",
                json!({ "_id": USER_OID, "subCompanyId": COMPANY_OID }),
                &EventOptions::default(),
            )
            .unwrap();
        assert_eq!(delivered, 3);
        assert_eq!(
            sink.rooms(),
            vec![
                "superadmin".to_string(),
                format!("admin_{COMPANY_OID}"),
                "investor".to_string()
            ]
        );
        assert_eq!(sink.calls()[0].envelope().data["_id"], USER_OID);

        let sink = RecordingSink::default();
        EventDispatcher::new(&sink)
            .dispatch_raw("user.updated", json!({ "id": USER_OID }), &EventOptions::default())
            .unwrap();
        assert_eq!(sink.users(), vec![EntityId::from(USER_OID)]);

        // Extended-JSON and populated references resolve to the same id.
        let sink = RecordingSink::default();
        EventDispatcher::new(&sink)
            .dispatch_raw(
                "investment.updated",
                json!({ "_id": USER_OID, "subCompanyId": { "$oid": COMPANY_OID } }),
                &EventOptions::default(),
            )
            .unwrap();
        assert_eq!(
            sink.rooms(),
            vec!["superadmin".to_string(), format!("admin_{COMPANY_OID}")]
        );
    }

    #[test]
    fn test_unknown_event_sends_nothing() {
        let sink = RecordingSink::default();
        let dispatcher = EventDispatcher::new(&sink);
        dispatcher.trigger_event("unknown.category", json!({}), &EventOptions::default());
        dispatcher.trigger_event("investment.vanished", json!({}), &EventOptions::default());
        assert!(sink.calls().is_empty());

        assert!(matches!(
            dispatcher.dispatch_raw("unknown.category", json!({}), &EventOptions::default()),
            Err(EventError::UnknownEvent(_))
        ));
    }

    #[test]
    fn test_bad_payload_sends_nothing() {
        let sink = RecordingSink::default();
        let dispatcher = EventDispatcher::new(&sink);
        let result = dispatcher.dispatch_raw(
            "investment.new_investor",
            json!({ "investment": {} }),
            &EventOptions::default(),
        );
        assert!(matches!(
            result,
            Err(EventError::InvalidPayload { event: "investment.new_investor", .. })
        ));
        assert!(sink.calls().is_empty());
    }

    #[test]
    fn test_updated_investment_targets() {
        let event = RealtimeEvent::InvestmentUpdated(investment(Some(COMPANY_OID)));
        assert_eq!(
            event.targets(&EventOptions::default()),
            vec![
                Target::Room(RoomId::for_role(Role::SuperAdmin)),
                Target::Room(RoomId::company_admins(&EntityId::from(COMPANY_OID))),
            ]
        );
    }

    #[test]
    fn test_new_investor_and_approval_reach_the_investor() {
        let sink = RecordingSink::default();
        let dispatcher = EventDispatcher::new(&sink);
        let investor: Investor =
            serde_json::from_value(json!({ "userId": USER_OID, "amount": 10 })).unwrap();

        dispatcher
            .investments()
            .new_investor(&investment(None), &investor);
        let calls = sink.calls();
        assert_eq!(sink.rooms(), vec!["superadmin", "admin"]);
        assert_eq!(sink.users(), vec![investor.user_id.clone()]);
        assert_eq!(calls[0].envelope().kind, "new_investor");
        assert_eq!(calls[0].envelope().data["investor"]["amount"], 10);

        let sink = RecordingSink::default();
        EventDispatcher::new(&sink)
            .investments()
            .approved(&investment(None), &investor);
        assert_eq!(
            sink.calls()
                .iter()
                .map(|s| match s {
                    Sent::User(id, _) => id.to_string(),
                    Sent::Room(room, _) => room.to_string(),
                    Sent::Broadcast(_) => "*".into(),
                })
                .collect::<Vec<_>>(),
            vec![investor.user_id.to_string(), "admin".into(), "superadmin".into()]
        );
    }

    #[test]
    fn test_user_events() {
        let sink = RecordingSink::default();
        let user: User = serde_json::from_value(json!({ "id": USER_OID })).unwrap();
        let dispatcher = EventDispatcher::new(&sink);

        dispatcher.users().created(&user);
        assert_eq!(sink.rooms(), vec!["admin", "superadmin"]);
        assert!(sink.users().is_empty());

        dispatcher.users().updated(&user);
        assert_eq!(sink.users(), vec![user.id.clone()]);
        assert_eq!(sink.calls().last().unwrap().envelope().kind, "user_updated");
    }

    #[test]
    fn test_company_events() {
        let sink = RecordingSink::default();
        let admin = EntityId::from(USER_OID);
        let company: Company =
            serde_json::from_value(json!({ "id": "c1", "adminId": admin })).unwrap();
        let dispatcher = EventDispatcher::new(&sink);

        dispatcher.companies().created(&company);
        assert_eq!(sink.rooms(), vec!["superadmin"]);
        assert!(sink.users().is_empty());

        dispatcher.companies().updated(&company);
        assert_eq!(sink.users(), vec![admin]);
    }

    #[test]
    fn test_audience_selection() {
        let sink = RecordingSink::default();
        let dispatcher = EventDispatcher::new(&sink);

        dispatcher.analytics().updated(json!({ "aum": 1 }), None);
        dispatcher
            .analytics()
            .performance_updated(json!({}), Some(Audience::Role(Role::Investor)));
        dispatcher
            .system()
            .alert(json!({ "message": "disk" }), Some(Audience::All));
        dispatcher
            .system()
            .maintenance(json!({}), Some(Audience::Role(Role::Admin)));

        let calls = sink.calls();
        assert!(matches!(&calls[0], Sent::Broadcast(e) if e.kind == "analytics_updated"));
        assert!(
            matches!(&calls[1], Sent::Room(r, e) if r.as_str() == "investor" && e.kind == "performance_updated")
        );
        assert!(matches!(&calls[2], Sent::Broadcast(e) if e.kind == "system_alert"));
        assert!(
            matches!(&calls[3], Sent::Room(r, e) if r.as_str() == "admin" && e.kind == "system_maintenance")
        );
    }

    #[test]
    fn test_options_deserialize_target_role() {
        let opts: EventOptions = serde_json::from_value(json!({ "targetRole": "all" })).unwrap();
        assert_eq!(opts.target_role, Some(Audience::All));
        let opts: EventOptions = serde_json::from_value(json!({})).unwrap();
        assert_eq!(opts.target_role, None);
        assert!(serde_json::from_value::<EventOptions>(json!({ "targetRole": "nobody" })).is_err());
    }
}
