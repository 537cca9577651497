use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize, Serializer};
use uuid::Uuid;

/// 分类阈值，概率严格大于该值判为 Cancer
pub const THRESHOLD: f32 = 0.5;

/// 分类结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Label {
    #[serde(rename = "Cancer")]
    Cancer,
    #[serde(rename = "Non-cancer")]
    NonCancer,
}

impl Label {
    pub fn from_probability(probability: f32) -> Self {
        if probability > THRESHOLD {
            Label::Cancer
        } else {
            Label::NonCancer
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Label::Cancer => "Cancer",
            Label::NonCancer => "Non-cancer",
        }
    }

    pub fn suggestion(self) -> &'static str {
        match self {
            Label::Cancer => "Segera periksa ke dokter!",
            Label::NonCancer => "Tetap jaga kesehatan!",
        }
    }
}

/// 单次预测的结果，创建后不可变
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Verdict {
    pub id: Uuid,
    pub result: Label,
    pub suggestion: String,
    #[serde(serialize_with = "serialize_iso_millis")]
    pub created_at: DateTime<Utc>,
}

impl Verdict {
    /// id 和时间戳在这里生成，必须在推理完成之后调用
    pub fn new(result: Label) -> Self {
        Self {
            id: Uuid::new_v4(),
            result,
            suggestion: result.suggestion().to_string(),
            created_at: Utc::now(),
        }
    }

    pub fn created_at_iso(&self) -> String {
        self.created_at.to_rfc3339_opts(SecondsFormat::Millis, true)
    }
}

fn serialize_iso_millis<S>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&value.to_rfc3339_opts(SecondsFormat::Millis, true))
}

/// 存储中的预测记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionRecord {
    pub id: String,
    pub result: String,
    pub suggestion: String,
    pub created_at: String,
}

impl From<&Verdict> for PredictionRecord {
    fn from(verdict: &Verdict) -> Self {
        Self {
            id: verdict.id.to_string(),
            result: verdict.result.as_str().to_string(),
            suggestion: verdict.suggestion.clone(),
            created_at: verdict.created_at_iso(),
        }
    }
}

/// 历史查询返回项
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryEntry {
    pub id: String,
    pub history: PredictionRecord,
}
