use crate::utils::error::{CheckoutError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use url::Url;

/// 固定的加購項目目錄，宣告順序即目錄順序
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AddOn {
    #[serde(rename = "4k-quality")]
    FourKQuality,
    #[serde(rename = "fast-delivery")]
    FastDelivery,
    #[serde(rename = "bonus-scene")]
    BonusScene,
    #[serde(rename = "combo-addons")]
    Combo,
}

impl AddOn {
    pub const INDIVIDUALS: [AddOn; 3] = [AddOn::FourKQuality, AddOn::FastDelivery, AddOn::BonusScene];

    pub fn id(&self) -> &'static str {
        match self {
            AddOn::FourKQuality => "4k-quality",
            AddOn::FastDelivery => "fast-delivery",
            AddOn::BonusScene => "bonus-scene",
            AddOn::Combo => "combo-addons",
        }
    }

    pub fn is_bundle(&self) -> bool {
        matches!(self, AddOn::Combo)
    }

    /// 結帳 URL 上對應的旗標參數名稱
    pub fn flag_param(&self) -> &'static str {
        match self {
            AddOn::FourKQuality => "addon_4k_quality",
            AddOn::FastDelivery => "addon_fast_delivery",
            AddOn::BonusScene => "addon_bonus_scene",
            AddOn::Combo => "addon_combo",
        }
    }
}

impl fmt::Display for AddOn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for AddOn {
    type Err = CheckoutError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "4k-quality" => Ok(AddOn::FourKQuality),
            "fast-delivery" => Ok(AddOn::FastDelivery),
            "bonus-scene" => Ok(AddOn::BonusScene),
            "combo-addons" => Ok(AddOn::Combo),
            other => Err(CheckoutError::ValidationError {
                field: "addOnIds".to_string(),
                message: format!("Unknown add-on id '{}'", other),
            }),
        }
    }
}

/// 已驗證的加購組合：要嘛只有套裝，要嘛是個別項目的任意子集
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<AddOn>", into = "Vec<AddOn>")]
pub struct AddOnSelection {
    items: BTreeSet<AddOn>,
}

impl AddOnSelection {
    pub fn empty() -> Self {
        Self::default()
    }

    /// 套裝與個別項目同時出現時，自動修正為只保留套裝
    pub fn from_add_ons<I: IntoIterator<Item = AddOn>>(add_ons: I) -> Self {
        let items: BTreeSet<AddOn> = add_ons.into_iter().collect();
        if items.contains(&AddOn::Combo) && items.len() > 1 {
            tracing::debug!(
                "🧩 Bundle selected together with {} individual add-on(s), keeping bundle only",
                items.len() - 1
            );
            return Self {
                items: BTreeSet::from([AddOn::Combo]),
            };
        }
        Self { items }
    }

    /// 從字串 id 建立，未知 id 直接拒絕
    pub fn parse<I, S>(ids: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let add_ons = ids
            .into_iter()
            .map(|id| id.as_ref().parse::<AddOn>())
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::from_add_ons(add_ons))
    }

    pub fn has_bundle(&self) -> bool {
        self.items.contains(&AddOn::Combo)
    }

    pub fn contains(&self, add_on: AddOn) -> bool {
        self.items.contains(&add_on)
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// 依目錄順序迭代
    pub fn iter(&self) -> impl Iterator<Item = AddOn> + '_ {
        self.items.iter().copied()
    }

    pub fn ids(&self) -> Vec<String> {
        self.iter().map(|a| a.id().to_string()).collect()
    }

    pub fn flags(&self) -> AddOnFlags {
        AddOnFlags::from_add_ons(self.iter())
    }
}

impl From<Vec<AddOn>> for AddOnSelection {
    fn from(add_ons: Vec<AddOn>) -> Self {
        Self::from_add_ons(add_ons)
    }
}

impl From<AddOnSelection> for Vec<AddOn> {
    fn from(selection: AddOnSelection) -> Self {
        selection.items.into_iter().collect()
    }
}

/// 每個加購項目一個布林旗標
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct AddOnFlags {
    pub four_k_quality: bool,
    pub fast_delivery: bool,
    pub bonus_scene: bool,
    pub combo: bool,
}

impl AddOnFlags {
    pub const fn new(four_k_quality: bool, fast_delivery: bool, bonus_scene: bool, combo: bool) -> Self {
        Self {
            four_k_quality,
            fast_delivery,
            bonus_scene,
            combo,
        }
    }

    pub fn from_add_ons<I: IntoIterator<Item = AddOn>>(add_ons: I) -> Self {
        let mut flags = Self::default();
        for add_on in add_ons {
            flags.set(add_on, true);
        }
        flags
    }

    /// 直接從原始 id 推導，忽略未知 id
    pub fn from_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::from_add_ons(ids.into_iter().filter_map(|id| id.as_ref().parse::<AddOn>().ok()))
    }

    pub fn get(&self, add_on: AddOn) -> bool {
        match add_on {
            AddOn::FourKQuality => self.four_k_quality,
            AddOn::FastDelivery => self.fast_delivery,
            AddOn::BonusScene => self.bonus_scene,
            AddOn::Combo => self.combo,
        }
    }

    fn set(&mut self, add_on: AddOn, value: bool) {
        match add_on {
            AddOn::FourKQuality => self.four_k_quality = value,
            AddOn::FastDelivery => self.fast_delivery = value,
            AddOn::BonusScene => self.bonus_scene = value,
            AddOn::Combo => self.combo = value,
        }
    }

    /// 套裝包含全部個別項目
    pub fn normalized(self) -> Self {
        if self.combo {
            Self::new(true, true, true, true)
        } else {
            self
        }
    }

    /// 結帳 URL 用的旗標參數，四個旗標全部輸出
    pub fn query_pairs(&self) -> Vec<(&'static str, &'static str)> {
        [AddOn::FourKQuality, AddOn::FastDelivery, AddOn::BonusScene, AddOn::Combo]
            .iter()
            .map(|a| (a.flag_param(), if self.get(*a) { "true" } else { "false" }))
            .collect()
    }

    /// 從已組好的結帳 URL 讀回旗標
    pub fn from_query(url: &Url) -> Self {
        let mut flags = Self::default();
        for (key, value) in url.query_pairs() {
            for add_on in [AddOn::FourKQuality, AddOn::FastDelivery, AddOn::BonusScene, AddOn::Combo] {
                if key == add_on.flag_param() {
                    flags.set(add_on, value == "true");
                }
            }
        }
        flags
    }
}

/// 九個預先建立好的結帳端點
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EndpointId {
    Base,
    #[serde(rename = "with4K")]
    With4K,
    WithFastDelivery,
    WithBonusScene,
    #[serde(rename = "with4KAndFastDelivery")]
    With4KAndFastDelivery,
    #[serde(rename = "with4KAndBonusScene")]
    With4KAndBonusScene,
    WithFastDeliveryAndBonusScene,
    WithAllAddOns,
    WithCombo,
}

/// 組合決策表，依優先順序排列：套裝、三項、兩兩組合、單項、基本
const DECISION_TABLE: [(EndpointId, AddOnFlags); 9] = [
    (EndpointId::WithCombo, AddOnFlags::new(true, true, true, true)),
    (EndpointId::WithAllAddOns, AddOnFlags::new(true, true, true, false)),
    (EndpointId::With4KAndFastDelivery, AddOnFlags::new(true, true, false, false)),
    (EndpointId::With4KAndBonusScene, AddOnFlags::new(true, false, true, false)),
    (EndpointId::WithFastDeliveryAndBonusScene, AddOnFlags::new(false, true, true, false)),
    (EndpointId::With4K, AddOnFlags::new(true, false, false, false)),
    (EndpointId::WithFastDelivery, AddOnFlags::new(false, true, false, false)),
    (EndpointId::WithBonusScene, AddOnFlags::new(false, false, true, false)),
    (EndpointId::Base, AddOnFlags::new(false, false, false, false)),
];

impl EndpointId {
    pub const ALL: [EndpointId; 9] = [
        EndpointId::Base,
        EndpointId::With4K,
        EndpointId::WithFastDelivery,
        EndpointId::WithBonusScene,
        EndpointId::With4KAndFastDelivery,
        EndpointId::With4KAndBonusScene,
        EndpointId::WithFastDeliveryAndBonusScene,
        EndpointId::WithAllAddOns,
        EndpointId::WithCombo,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EndpointId::Base => "base",
            EndpointId::With4K => "with4K",
            EndpointId::WithFastDelivery => "withFastDelivery",
            EndpointId::WithBonusScene => "withBonusScene",
            EndpointId::With4KAndFastDelivery => "with4KAndFastDelivery",
            EndpointId::With4KAndBonusScene => "with4KAndBonusScene",
            EndpointId::WithFastDeliveryAndBonusScene => "withFastDeliveryAndBonusScene",
            EndpointId::WithAllAddOns => "withAllAddOns",
            EndpointId::WithCombo => "withCombo",
        }
    }

    /// 依決策表解析，套裝優先
    pub fn resolve(flags: AddOnFlags) -> Self {
        let normalized = flags.normalized();
        DECISION_TABLE
            .iter()
            .find(|(_, row)| *row == normalized)
            .map(|(id, _)| *id)
            // 正規化後只有九種狀態，表格全部涵蓋
            .unwrap_or(EndpointId::Base)
    }

    /// 此端點代表的旗標組合
    pub fn flags(&self) -> AddOnFlags {
        DECISION_TABLE
            .iter()
            .find(|(id, _)| id == self)
            .map(|(_, flags)| *flags)
            .unwrap_or_default()
    }
}

impl fmt::Display for EndpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EndpointId {
    type Err = CheckoutError;

    fn from_str(s: &str) -> Result<Self> {
        EndpointId::ALL
            .iter()
            .copied()
            .find(|id| id.as_str() == s)
            .ok_or_else(|| CheckoutError::ConfigError {
                message: format!("Unknown endpoint id '{}'", s),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rejects_unknown_id() {
        let err = AddOnSelection::parse(["4k-quality", "glitter"]).unwrap_err();
        assert!(matches!(err, CheckoutError::ValidationError { .. }));
    }

    #[test]
    fn test_bundle_wins_over_individuals() {
        let selection = AddOnSelection::parse(["fast-delivery", "combo-addons", "4k-quality"]).unwrap();
        assert_eq!(selection.ids(), vec!["combo-addons".to_string()]);
    }

    #[test]
    fn test_ids_follow_catalog_order() {
        let selection = AddOnSelection::parse(["bonus-scene", "4k-quality"]).unwrap();
        assert_eq!(selection.ids(), vec!["4k-quality", "bonus-scene"]);
    }

    #[test]
    fn test_selection_serializes_as_id_list() {
        let selection = AddOnSelection::parse(["fast-delivery", "4k-quality"]).unwrap();
        let json = serde_json::to_string(&selection).unwrap();
        assert_eq!(json, r#"["4k-quality","fast-delivery"]"#);

        let corrected: AddOnSelection = serde_json::from_str(r#"["combo-addons","bonus-scene"]"#).unwrap();
        assert_eq!(corrected.ids(), vec!["combo-addons"]);
    }

    #[test]
    fn test_every_flag_state_resolves_to_its_own_row() {
        for bits in 0u8..16 {
            let flags = AddOnFlags::new(bits & 1 != 0, bits & 2 != 0, bits & 4 != 0, bits & 8 != 0);
            let endpoint = EndpointId::resolve(flags);
            assert_eq!(endpoint.flags(), flags.normalized(), "state {:04b}", bits);
        }
    }

    #[test]
    fn test_endpoint_ids_match_serde_names() {
        for id in EndpointId::ALL {
            let json = serde_json::to_string(&id).unwrap();
            assert_eq!(json, format!("\"{}\"", id.as_str()));
            assert_eq!(id.as_str().parse::<EndpointId>().unwrap(), id);
        }
    }

    #[test]
    fn test_flags_query_round_trip() {
        let flags = AddOnFlags::from_ids(["bonus-scene", "fast-delivery"]);
        let mut url = Url::parse("https://pay.example.com/checkout").unwrap();
        url.query_pairs_mut().extend_pairs(flags.query_pairs());
        assert_eq!(AddOnFlags::from_query(&url), flags);
    }
}
