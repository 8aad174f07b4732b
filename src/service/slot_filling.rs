//! Slot filling: service-type classification and field accumulation.
//!
//! A conversation is unclassified until its first processed message, then
//! collects fields until every required slot of its service type is
//! present. Extraction only ever adds or overwrites fields it has evidence
//! for; it never clears one.

use std::fmt;
use std::sync::Arc;

use regex::Regex;
use serde_json::Value;

use crate::domain::slot::is_filled;
use crate::domain::{
    Conversation, ConversationId, ConversationRepository, ConversationSlotState, HomeServiceKind,
    ServiceType, SlotData,
};
use crate::error::GatewayError;

/// Opaque extraction capability: classifies messages and pulls slot values
/// out of free text.
pub trait SlotExtractor: Send + Sync + fmt::Debug {
    /// Classifies a message, or `None` when nothing matches.
    fn detect_service_type(&self, message: &str) -> Option<ServiceType>;

    /// Extracts the slot values `message` gives positive evidence for.
    ///
    /// `current` is the data collected so far; extractors may use it to
    /// avoid replacing an established value with a weaker guess.
    fn extract(&self, service_type: ServiceType, message: &str, current: &SlotData) -> SlotData;
}

const SHOPPING_KEYWORDS: &[&str] = &[
    "buy", "purchase", "bubble tea", "milk tea", "chicken rice", "groceries", "supermarket", "买",
    "购", "奶茶", "鸡饭", "超市",
];

const ERRAND_KEYWORDS: &[&str] = &[
    "deliver", "send", "pick up", "pickup", "document", "parcel", "package", "courier", "送", "取",
    "文件", "包裹", "快递",
];

const HOME_SERVICE_KEYWORDS: &[&str] = &[
    "clean", "repair", "fix", "install", "massage", "technician", "home service", "清洁", "维修",
    "安装", "按摩", "推拿", "上门",
];

const KNOWN_SHOPS: &[&str] = &[
    "Yik Chong",
    "Maxwell",
    "Tian Tian",
    "Hainanese chicken rice",
    "FairPrice",
    "supermarket",
    "wet market",
    "益昌老街",
    "天天",
    "海南鸡饭",
    "超市",
    "菜市场",
];

const HOME_KIND_KEYWORDS: &[(HomeServiceKind, &[&str])] = &[
    (HomeServiceKind::Cleaning, &["clean", "清洁"]),
    (HomeServiceKind::Repair, &["repair", "fix", "维修"]),
    (HomeServiceKind::Installation, &["install", "assemble", "安装"]),
    (HomeServiceKind::Massage, &["massage", "按摩", "推拿"]),
];

/// Keyword and pattern heuristics for English and Chinese messages.
#[derive(Debug)]
pub struct KeywordExtractor {
    budget_prefix: Regex,
    budget_suffix: Regex,
    from_to: Regex,
    deliver_to: Regex,
    pickup_zh: Regex,
    deliver_zh: Regex,
    shop_from: Regex,
    buy_items: Regex,
    buy_items_zh: Regex,
    address: Regex,
    block_address: Regex,
    phone: Regex,
    time: Regex,
    note: Regex,
    details: Regex,
    location: Regex,
}

impl KeywordExtractor {
    /// Compiles the extraction patterns.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Internal`] if a pattern fails to compile.
    pub fn new() -> Result<Self, GatewayError> {
        let re = |pattern: &str| {
            Regex::new(pattern)
                .map_err(|e| GatewayError::Internal(format!("slot pattern failed to compile: {e}")))
        };
        Ok(Self {
            budget_prefix: re(r"(?i)(?:S\$|\$|SGD\s*)\s*(\d+(?:\.\d{1,2})?)")?,
            budget_suffix: re(r"(?i)(\d+(?:\.\d{1,2})?)\s*(?:块|元|新币|sgd|dollars?|bucks)")?,
            from_to: re(r"(?i)\bfrom\s+(.+?)\s+to\s+(.+?)(?:[,，.。!！]|$)")?,
            deliver_to: re(
                r"(?i)\b(?:deliver(?:ed)?|send|bring|drop)(?:\s+(?:it|them|this))?(?:\s+off)?\s+to\s+(.+?)(?:[,，.。!！]|$)",
            )?,
            pickup_zh: re(r"从(.+?)(?:送|到|至)")?,
            deliver_zh: re(r"(?:送到|送至|到|至)(.+?)(?:[,，。！!]|$)")?,
            shop_from: re(r"(?i)\b(?:from|at)\s+(.+?)(?:\s+(?:and|then)\b|[,，.。!！]|$)")?,
            buy_items: re(
                r"(?i)\b(?:buy|get|order|grab)\s+(?:me\s+)?(?:some\s+)?(.+?)(?:\s+(?:from|at)\b|[,，.。!！]|$)",
            )?,
            buy_items_zh: re(r"(?:买|我要)(.+?)(?:送到|送至|[,，。！!]|$)")?,
            address: re(
                r"(?i)(?:\baddress(?:\s+is)?\s*[:：]?|地址(?:是)?[:：]?)\s*(.+?)(?:[,，。!！]|$)",
            )?,
            block_address: re(r"(?i)\b((?:blk|block)\s+\d+[a-z]?\b[^,，。!！]*)")?,
            phone: re(r"(?:\+65[\s-]?)?\b[689]\d{3}[\s-]?\d{4}\b")?,
            time: re(
                r"(?i)\b(?:today|tonight|tomorrow|this\s+(?:morning|afternoon|evening|weekend)|next\s+\w+|(?:mon|tues|wednes|thurs|fri|satur|sun)day)\b(?:\s+(?:at\s+)?\d{1,2}(?::\d{2})?\s*(?:am|pm)?)?|\b\d{1,2}(?::\d{2})?\s*(?:am|pm)\b|(?:今天|明天|后天|今晚|周[一二三四五六日天]|星期[一二三四五六日天])(?:上午|下午|晚上)?(?:\d{1,2}点半?)?|\basap\b|马上|尽快",
            )?,
            note: re(r"(?i)(?:\b(?:note|instructions?|remarks?)\s*[:：]|备注[:：]?)\s*(.+)$")?,
            details: re(r"(?i)\b(?:details?|problem|issue)\s*[:：]\s*(.+)$")?,
            location: re(r"\b(?:at|in|near|around)\s+([A-Z][\w']*(?:\s+[A-Z][\w']*)*)|在(.+?)(?:[,，。！!]|$)")?,
        })
    }

    fn capture(re: &Regex, message: &str) -> Option<String> {
        let caps = re.captures(message)?;
        let text = caps.iter().skip(1).flatten().next()?.as_str().trim();
        (!text.is_empty()).then(|| text.to_string())
    }

    fn budget(&self, message: &str) -> Option<Value> {
        let raw = Self::capture(&self.budget_prefix, message)
            .or_else(|| Self::capture(&self.budget_suffix, message))?;
        let amount: f64 = raw.parse().ok()?;
        serde_json::Number::from_f64(amount).map(Value::Number)
    }

    fn time(&self, message: &str) -> Option<String> {
        self.time.find(message).map(|m| m.as_str().trim().to_string())
    }

    fn extract_shopping(&self, message: &str, current: &SlotData, out: &mut SlotData) {
        let lower = message.to_lowercase();
        let shop = KNOWN_SHOPS
            .iter()
            .find(|shop| lower.contains(&shop.to_lowercase()))
            .map(|shop| (*shop).to_string())
            .or_else(|| Self::capture(&self.shop_from, message));
        if let Some(shop) = shop {
            out.insert("shopName".into(), Value::String(shop));
        }

        if !current.get("items").is_some_and(is_filled)
            && let Some(items) = Self::capture(&self.buy_items, message)
                .or_else(|| Self::capture(&self.buy_items_zh, message))
        {
            out.insert("items".into(), Value::String(items));
        }

        if let Some(address) = Self::capture(&self.deliver_zh, message)
            .filter(|_| message.contains("送到"))
            .or_else(|| Self::capture(&self.deliver_to, message))
        {
            out.insert("deliveryAddress".into(), Value::String(address));
        }

        if let Some(budget) = self.budget(message) {
            out.insert("userBudget".into(), budget);
        }
    }

    fn extract_errand(&self, message: &str, out: &mut SlotData) {
        if let Some(caps) = self.from_to.captures(message) {
            if let Some(pickup) = caps.get(1) {
                out.insert("pickupAddress".into(), Value::String(pickup.as_str().trim().into()));
            }
            if let Some(delivery) = caps.get(2) {
                out.insert("deliveryAddress".into(), Value::String(delivery.as_str().trim().into()));
            }
        }
        if let Some(pickup) = Self::capture(&self.pickup_zh, message) {
            out.insert("pickupAddress".into(), Value::String(pickup));
        }
        if let Some(delivery) = Self::capture(&self.deliver_zh, message)
            .or_else(|| Self::capture(&self.deliver_to, message))
        {
            out.entry("deliveryAddress".to_string())
                .or_insert(Value::String(delivery));
        }
        if let Some(note) = Self::capture(&self.note, message) {
            out.insert("instructions".into(), Value::String(note));
        }
        if let Some(time) = self.time(message) {
            out.insert("timeRequirement".into(), Value::String(time));
        }
    }

    fn extract_home_service(&self, message: &str, current: &SlotData, out: &mut SlotData) {
        let lower = message.to_lowercase();
        let kind = HOME_KIND_KEYWORDS
            .iter()
            .find(|(_, keywords)| keywords.iter().any(|k| lower.contains(k)))
            .map(|(kind, _)| *kind);
        if let Some(kind) = kind {
            out.insert("serviceType".into(), Value::String(kind.label().into()));
        }

        if let Some(address) = Self::capture(&self.address, message)
            .or_else(|| Self::capture(&self.block_address, message))
        {
            out.insert("address".into(), Value::String(address));
        }
        if let Some(time) = self.time(message) {
            out.insert("scheduledTime".into(), Value::String(time));
        }
        if let Some(phone) = self.phone.find(message) {
            out.insert("customerContact".into(), Value::String(phone.as_str().to_string()));
        }

        let details = Self::capture(&self.details, message).or_else(|| {
            (kind.is_some() && !current.get("details").is_some_and(is_filled))
                .then(|| message.trim().to_string())
        });
        if let Some(details) = details {
            out.insert("details".into(), Value::String(details));
        }
    }

    fn extract_open_request(&self, message: &str, current: &SlotData, out: &mut SlotData) {
        if !current.get("description").is_some_and(is_filled) {
            out.insert("description".into(), Value::String(message.trim().to_string()));
        }
        if let Some(location) = Self::capture(&self.location, message) {
            out.insert("location".into(), Value::String(location));
        }
        if let Some(time) = self.time(message) {
            out.insert("timeRequirement".into(), Value::String(time));
        }
    }
}

impl SlotExtractor for KeywordExtractor {
    fn detect_service_type(&self, message: &str) -> Option<ServiceType> {
        let lower = message.to_lowercase();
        let hit = |keywords: &[&str]| keywords.iter().any(|k| lower.contains(k));
        if hit(SHOPPING_KEYWORDS) {
            Some(ServiceType::Shopping)
        } else if hit(ERRAND_KEYWORDS) {
            Some(ServiceType::Errand)
        } else if hit(HOME_SERVICE_KEYWORDS) {
            Some(ServiceType::HomeService)
        } else {
            None
        }
    }

    fn extract(&self, service_type: ServiceType, message: &str, current: &SlotData) -> SlotData {
        let mut out = SlotData::new();
        match service_type {
            ServiceType::Shopping => self.extract_shopping(message, current, &mut out),
            ServiceType::Errand => self.extract_errand(message, &mut out),
            ServiceType::HomeService => self.extract_home_service(message, current, &mut out),
            ServiceType::OpenRequest => self.extract_open_request(message, current, &mut out),
        }
        out
    }
}

/// Owner of per-conversation slot state.
#[derive(Debug, Clone)]
pub struct SlotFillingService {
    extractor: Arc<dyn SlotExtractor>,
    conversations: Arc<dyn ConversationRepository>,
}

impl SlotFillingService {
    /// Creates the service.
    #[must_use]
    pub fn new(
        extractor: Arc<dyn SlotExtractor>,
        conversations: Arc<dyn ConversationRepository>,
    ) -> Self {
        Self {
            extractor,
            conversations,
        }
    }

    /// Classifies a message.
    #[must_use]
    pub fn detect_service_type(&self, message: &str) -> Option<ServiceType> {
        self.extractor.detect_service_type(message)
    }

    /// Returns the slot state of a conversation, if it has processed a
    /// message yet.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::ConversationNotFound`] for an unknown id.
    pub async fn context(
        &self,
        conversation_id: ConversationId,
    ) -> Result<Option<ConversationSlotState>, GatewayError> {
        let handle = self.conversations.get(conversation_id).await?;
        let conversation = handle.lock().await;
        Ok(conversation.slots.clone())
    }

    /// Processes one user turn of a conversation, creating the conversation
    /// if it does not exist yet.
    ///
    /// `assistant_reply` is the reply produced for this turn; the slot state
    /// is derived from the user's message alone.
    pub async fn process_response(
        &self,
        conversation_id: ConversationId,
        user_id: &str,
        user_message: &str,
        assistant_reply: &str,
    ) -> ConversationSlotState {
        let handle = self.conversations.get_or_create(conversation_id, user_id).await;
        let mut conversation = handle.lock().await;
        tracing::debug!(
            %conversation_id,
            reply_len = assistant_reply.len(),
            "processing slot turn"
        );
        self.apply_turn(&mut conversation, user_message)
    }

    /// Applies one user message to a conversation already locked by the
    /// caller.
    pub fn apply_turn(
        &self,
        conversation: &mut Conversation,
        user_message: &str,
    ) -> ConversationSlotState {
        let conversation_id = conversation.id;
        let preset = conversation.preset_service_type;
        let state = conversation.slots.get_or_insert_with(|| {
            let service_type = preset
                .or_else(|| self.extractor.detect_service_type(user_message))
                .unwrap_or(ServiceType::OpenRequest);
            tracing::info!(%conversation_id, %service_type, "conversation classified");
            ConversationSlotState::new(service_type)
        });

        let extracted = self
            .extractor
            .extract(state.service_type, user_message, &state.slot_data);
        state.merge(extracted);
        tracing::debug!(
            %conversation_id,
            missing = ?state.missing_fields,
            complete = state.is_complete,
            "slots updated"
        );
        state.clone()
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::persistence::InMemoryConversationStore;
    use serde_json::json;

    fn extractor() -> KeywordExtractor {
        let Ok(extractor) = KeywordExtractor::new() else {
            panic!("patterns should compile");
        };
        extractor
    }

    fn service() -> SlotFillingService {
        SlotFillingService::new(
            Arc::new(extractor()),
            Arc::new(InMemoryConversationStore::new()),
        )
    }

    #[test]
    fn detects_each_service_type() {
        let ex = extractor();
        assert_eq!(
            ex.detect_service_type("Can you buy me bubble tea?"),
            Some(ServiceType::Shopping)
        );
        assert_eq!(
            ex.detect_service_type("帮我买两杯奶茶"),
            Some(ServiceType::Shopping)
        );
        assert_eq!(
            ex.detect_service_type("Please deliver a parcel"),
            Some(ServiceType::Errand)
        );
        assert_eq!(
            ex.detect_service_type("I need my aircon to be repaired"),
            Some(ServiceType::HomeService)
        );
        assert_eq!(ex.detect_service_type("walk my dog"), None);
    }

    #[test]
    fn extracts_errand_addresses() {
        let ex = extractor();
        let slots = ex.extract(
            ServiceType::Errand,
            "Send documents from Raffles Place to Tampines Hub, before 5pm",
            &SlotData::new(),
        );
        assert_eq!(slots.get("pickupAddress"), Some(&json!("Raffles Place")));
        assert_eq!(slots.get("deliveryAddress"), Some(&json!("Tampines Hub")));
        assert_eq!(slots.get("timeRequirement"), Some(&json!("5pm")));

        let zh = ex.extract(ServiceType::Errand, "从公司送到家里", &SlotData::new());
        assert_eq!(zh.get("pickupAddress"), Some(&json!("公司")));
        assert_eq!(zh.get("deliveryAddress"), Some(&json!("家里")));
    }

    #[test]
    fn extracts_shopping_fields() {
        let ex = extractor();
        let slots = ex.extract(
            ServiceType::Shopping,
            "Buy 2 bubble tea from Yik Chong, deliver to Blk 123 Bedok North, budget $15",
            &SlotData::new(),
        );
        assert_eq!(slots.get("shopName"), Some(&json!("Yik Chong")));
        assert_eq!(slots.get("items"), Some(&json!("2 bubble tea")));
        assert_eq!(slots.get("deliveryAddress"), Some(&json!("Blk 123 Bedok North")));
        assert_eq!(slots.get("userBudget"), Some(&json!(15.0)));
    }

    #[test]
    fn items_need_a_purchase_verb() {
        let ex = extractor();
        let budget_only = ex.extract(ServiceType::Shopping, "my budget is $20", &SlotData::new());
        assert_eq!(budget_only.get("items"), None);
        assert_eq!(budget_only.get("userBudget"), Some(&json!(20.0)));

        let border = ex.extract(
            ServiceType::Shopping,
            "the shop is near the border, target price 10 dollars",
            &SlotData::new(),
        );
        assert_eq!(border.get("items"), None);

        let zh = ex.extract(ServiceType::Shopping, "帮我买两杯奶茶送到公司", &SlotData::new());
        assert_eq!(zh.get("items"), Some(&json!("两杯奶茶")));
    }

    #[test]
    fn extracts_home_service_contact_and_kind() {
        let ex = extractor();
        let slots = ex.extract(
            ServiceType::HomeService,
            "Need cleaning tomorrow 10am, address: Blk 5 Jurong West, call 9123 4567",
            &SlotData::new(),
        );
        assert_eq!(slots.get("serviceType"), Some(&json!("home cleaning")));
        assert_eq!(slots.get("address"), Some(&json!("Blk 5 Jurong West")));
        assert_eq!(slots.get("scheduledTime"), Some(&json!("tomorrow 10am")));
        assert_eq!(slots.get("customerContact"), Some(&json!("9123 4567")));
        assert!(slots.contains_key("details"));
    }

    #[tokio::test]
    async fn first_message_classifies_and_defaults_to_open_request() {
        let service = service();
        let id = ConversationId::new();
        let state = service
            .process_response(id, "u1", "walk my dog in the evening", "ok")
            .await;
        assert_eq!(state.service_type, ServiceType::OpenRequest);
        assert!(state.is_complete);
        assert_eq!(state.slot_data.get("description"), Some(&json!("walk my dog in the evening")));
    }

    #[tokio::test]
    async fn service_type_is_fixed_after_first_message() {
        let service = service();
        let id = ConversationId::new();
        let first = service
            .process_response(id, "u1", "Please deliver a parcel", "")
            .await;
        assert_eq!(first.service_type, ServiceType::Errand);

        let second = service
            .process_response(id, "u1", "also buy me milk tea", "")
            .await;
        assert_eq!(second.service_type, ServiceType::Errand);
    }

    #[tokio::test]
    async fn errand_fields_accumulate_monotonically() {
        let service = service();
        let id = ConversationId::new();
        let turns = [
            "I need a parcel picked up",
            "from Raffles Place to Tampines Hub",
            "note: fragile",
            "thanks!",
        ];
        let mut seen_complete = false;
        for turn in turns {
            let state = service.process_response(id, "u1", turn, "").await;
            if seen_complete {
                assert!(state.is_complete, "completeness regressed on {turn:?}");
            }
            seen_complete |= state.is_complete;
            assert_eq!(state.is_complete, state.missing_fields.is_empty());
        }
        assert!(seen_complete);

        let Ok(Some(context)) = service.context(id).await else {
            panic!("context missing");
        };
        assert_eq!(context.slot_data.get("pickupAddress"), Some(&json!("Raffles Place")));
        assert_eq!(context.slot_data.get("instructions"), Some(&json!("fragile")));
    }

    #[tokio::test]
    async fn preset_service_type_skips_detection() {
        let service = service();
        let mut conversation =
            Conversation::new(ConversationId::new(), "u1", Some(ServiceType::HomeService));
        let state = service.apply_turn(&mut conversation, "buy me something");
        assert_eq!(state.service_type, ServiceType::HomeService);
    }
}
