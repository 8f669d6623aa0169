use serde::{Deserialize, Serialize};

/// 投递状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Accepted,
    Partial,
    Rejected,
}

impl DeliveryStatus {
    /// 由累计计数推导：无拒绝 → accepted；无接受且有拒绝 → rejected；否则 partial
    pub fn from_counts(accepted_count: u64, rejected_count: u64) -> Self {
        if rejected_count == 0 {
            DeliveryStatus::Accepted
        } else if accepted_count == 0 {
            DeliveryStatus::Rejected
        } else {
            DeliveryStatus::Partial
        }
    }
}

/// 被拒绝的事件
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectedEvent {
    pub index: u64,
    pub error: String,
}

/// 服务端对单个分块的响应
#[derive(Debug, Clone, Deserialize)]
pub struct ChunkResponse {
    pub status: DeliveryStatus,
    pub accepted_count: u64,
    #[serde(default)]
    pub rejected_count: Option<u64>,
    #[serde(default)]
    pub event_ids: Option<Vec<String>>,
    #[serde(default)]
    pub rejected: Option<Vec<RejectedEvent>>,
}

impl ChunkResponse {
    /// 服务端未给出 rejected_count 时按 rejected 列表长度计
    pub fn effective_rejected_count(&self) -> u64 {
        self.rejected_count
            .unwrap_or_else(|| self.rejected.as_ref().map_or(0, |r| r.len() as u64))
    }
}

/// 聚合后的投递结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryResult {
    pub status: DeliveryStatus,
    pub accepted_count: u64,
    pub rejected_count: u64,
    pub event_ids: Vec<String>,
    pub rejected: Vec<RejectedEvent>,
}

impl Default for DeliveryResult {
    fn default() -> Self {
        Self {
            status: DeliveryStatus::Accepted,
            accepted_count: 0,
            rejected_count: 0,
            event_ids: Vec::new(),
            rejected: Vec::new(),
        }
    }
}

impl DeliveryResult {
    /// 按分块顺序合并一个分块响应
    ///
    /// 被拒绝事件的 index 以之前各分块响应中已确认（accepted + rejected）的
    /// 事件数为偏移，因此最终结果中的 index 唯一且按分块顺序递增。
    ///
    /// 偏移有意包含已接受的事件，不能改为只按之前的拒绝数：
    /// A `{accepted 1, rejected [1]}` + B `{rejected [0]}` 必须得到 1 和 2。
    ///
    /// 服务端给出的计数与 index 按饱和加法累计，异常值不会溢出。
    pub fn merge_chunk(&mut self, response: ChunkResponse) {
        let offset = self.accepted_count.saturating_add(self.rejected_count);
        let chunk_rejected = response.effective_rejected_count();

        if let Some(ids) = response.event_ids {
            self.event_ids.extend(ids);
        }
        if let Some(rejected) = response.rejected {
            self.rejected.extend(rejected.into_iter().map(|r| RejectedEvent {
                index: r.index.saturating_add(offset),
                error: r.error,
            }));
        }

        self.accepted_count = self.accepted_count.saturating_add(response.accepted_count);
        self.rejected_count = self.rejected_count.saturating_add(chunk_rejected);
        self.status = DeliveryStatus::from_counts(self.accepted_count, self.rejected_count);
    }

    pub fn is_fully_accepted(&self) -> bool {
        self.status == DeliveryStatus::Accepted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn chunk(value: serde_json::Value) -> ChunkResponse {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn status_derivation() {
        assert_eq!(DeliveryStatus::from_counts(0, 0), DeliveryStatus::Accepted);
        assert_eq!(DeliveryStatus::from_counts(5, 0), DeliveryStatus::Accepted);
        assert_eq!(DeliveryStatus::from_counts(0, 3), DeliveryStatus::Rejected);
        assert_eq!(DeliveryStatus::from_counts(2, 3), DeliveryStatus::Partial);
    }

    #[test]
    fn concatenates_ids_in_chunk_order() {
        let first: Vec<String> = (0..100).map(|i| format!("a{}", i)).collect();
        let second: Vec<String> = (0..50).map(|i| format!("b{}", i)).collect();

        let mut result = DeliveryResult::default();
        result.merge_chunk(chunk(json!({
            "status": "accepted", "accepted_count": 100, "event_ids": first
        })));
        result.merge_chunk(chunk(json!({
            "status": "accepted", "accepted_count": 50, "event_ids": second
        })));

        assert_eq!(result.status, DeliveryStatus::Accepted);
        assert_eq!(result.accepted_count, 150);
        assert_eq!(result.event_ids.len(), 150);
        assert_eq!(result.event_ids[0], "a0");
        assert_eq!(result.event_ids[99], "a99");
        assert_eq!(result.event_ids[100], "b0");
    }

    #[test]
    fn rebases_rejected_indices_across_chunks() {
        let mut result = DeliveryResult::default();
        result.merge_chunk(chunk(json!({
            "status": "partial", "accepted_count": 1,
            "rejected": [{ "index": 1, "error": "x" }]
        })));
        result.merge_chunk(chunk(json!({
            "status": "rejected", "accepted_count": 0,
            "rejected": [{ "index": 0, "error": "y" }]
        })));

        assert_eq!(result.rejected.len(), 2);
        assert_eq!(result.rejected[0], RejectedEvent { index: 1, error: "x".into() });
        assert_eq!(result.rejected[1], RejectedEvent { index: 2, error: "y".into() });
        assert_eq!(result.rejected_count, 2);
        assert_eq!(result.accepted_count, 1);
        assert_eq!(result.status, DeliveryStatus::Partial);
    }

    #[test]
    fn all_rejected_is_rejected() {
        let mut result = DeliveryResult::default();
        result.merge_chunk(chunk(json!({
            "status": "rejected", "accepted_count": 0, "rejected_count": 2,
            "rejected": [{ "index": 0, "error": "a" }, { "index": 1, "error": "b" }]
        })));
        assert_eq!(result.status, DeliveryStatus::Rejected);
        assert!(!result.is_fully_accepted());
    }

    #[test]
    fn oversized_server_numbers_saturate() {
        let mut result = DeliveryResult::default();
        result.merge_chunk(chunk(json!({
            "status": "partial", "accepted_count": 5,
            "rejected": [{ "index": 0, "error": "a" }]
        })));
        result.merge_chunk(chunk(json!({
            "status": "partial", "accepted_count": u64::MAX, "rejected_count": u64::MAX,
            "rejected": [{ "index": u64::MAX, "error": "b" }]
        })));

        assert_eq!(result.rejected[1].index, u64::MAX);
        assert_eq!(result.accepted_count, u64::MAX);
        assert_eq!(result.rejected_count, u64::MAX);
        assert_eq!(result.status, DeliveryStatus::Partial);
    }

    #[test]
    fn explicit_rejected_count_wins_over_list_length() {
        let response = chunk(json!({
            "status": "partial", "accepted_count": 3, "rejected_count": 4,
            "rejected": [{ "index": 0, "error": "a" }]
        }));
        assert_eq!(response.effective_rejected_count(), 4);
    }
}
