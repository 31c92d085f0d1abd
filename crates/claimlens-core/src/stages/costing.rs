//! Stage 4: price every repair task and aggregate the estimate.
//!
//! Labor is priced from regional rate bands keyed by the first two digits of
//! the ZIP code, materials from keyword-driven bills of materials. Both are
//! tier-aware.

use std::sync::Arc;

use async_trait::async_trait;
use claimlens_state::{EstimateTier, JobStatus};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{Dossier, Stage, StageContext, StageOutcome};
use crate::domain::{Assessment, Result, Task};
use crate::policy::{CostingPolicy, PolicyConfig, TierComparisonMode};

const FALLBACK_TRADE: &str = "general_carpentry";
const DEFAULT_LABOR_COEFFICIENT: f64 = 0.1;
const UNKNOWN_ROOM: &str = "Unknown";

/// Hourly labor rate range for one trade in one region.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateBand {
    pub min: f64,
    pub max: f64,
}

impl RateBand {
    const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Economy takes the floor, premium the ceiling, standard the midpoint.
    pub fn rate_for(&self, tier: EstimateTier) -> f64 {
        match tier {
            EstimateTier::Economy => self.min,
            EstimateTier::Standard => (self.min + self.max) / 2.0,
            EstimateTier::Premium => self.max,
        }
    }
}

type RegionTable = &'static [(&'static str, RateBand)];

const HOUSTON_RATES: RegionTable = &[
    ("general_carpentry", RateBand::new(65.0, 85.0)),
    ("roofing", RateBand::new(75.0, 95.0)),
    ("electrical", RateBand::new(85.0, 110.0)),
    ("plumbing", RateBand::new(90.0, 115.0)),
    ("hvac", RateBand::new(95.0, 120.0)),
    ("drywall", RateBand::new(55.0, 75.0)),
    ("painting", RateBand::new(50.0, 70.0)),
    ("flooring", RateBand::new(60.0, 80.0)),
];

const LOS_ANGELES_RATES: RegionTable = &[
    ("general_carpentry", RateBand::new(75.0, 95.0)),
    ("roofing", RateBand::new(85.0, 110.0)),
    ("electrical", RateBand::new(95.0, 125.0)),
    ("plumbing", RateBand::new(100.0, 130.0)),
    ("hvac", RateBand::new(105.0, 135.0)),
    ("drywall", RateBand::new(65.0, 85.0)),
    ("painting", RateBand::new(60.0, 80.0)),
    ("flooring", RateBand::new(70.0, 90.0)),
];

const DEFAULT_RATES: RegionTable = &[
    ("general_carpentry", RateBand::new(60.0, 80.0)),
    ("roofing", RateBand::new(70.0, 90.0)),
    ("electrical", RateBand::new(80.0, 105.0)),
    ("plumbing", RateBand::new(85.0, 110.0)),
    ("hvac", RateBand::new(90.0, 115.0)),
    ("drywall", RateBand::new(50.0, 70.0)),
    ("painting", RateBand::new(45.0, 65.0)),
    ("flooring", RateBand::new(55.0, 75.0)),
];

/// Labor hours per unit of quantity, by trade.
const LABOR_COEFFICIENTS: &[(&str, f64)] = &[
    ("general_carpentry", 0.15),
    ("drywall", 0.08),
    ("painting", 0.05),
    ("flooring", 0.1),
    ("roofing", 0.12),
    ("electrical", 0.2),
    ("plumbing", 0.25),
    ("hvac", 0.3),
];

fn zip_prefix(zip_code: &str) -> &str {
    zip_code.trim().get(..2).unwrap_or("")
}

fn region_table(zip_code: &str) -> RegionTable {
    match zip_prefix(zip_code) {
        "77" => HOUSTON_RATES,
        "90" => LOS_ANGELES_RATES,
        _ => DEFAULT_RATES,
    }
}

fn lookup<T: Copy>(table: &[(&str, T)], key: &str) -> Option<T> {
    table.iter().find(|(k, _)| *k == key).map(|(_, v)| *v)
}

/// Rate band for a trade in the region of `zip_code`. Unknown regions use the
/// default table; unknown trades use the general carpentry band.
pub fn rate_band(zip_code: &str, trade: &str) -> RateBand {
    let table = region_table(zip_code);
    lookup(table, trade)
        .or_else(|| lookup(table, FALLBACK_TRADE))
        .unwrap_or(RateBand::new(0.0, 0.0))
}

pub fn tier_multiplier(tier: EstimateTier) -> f64 {
    match tier {
        EstimateTier::Economy => 0.8,
        EstimateTier::Standard => 1.0,
        EstimateTier::Premium => 1.5,
    }
}

/// Estimated labor hours for a task.
pub fn labor_hours(task: &Task) -> f64 {
    let quantity = task.quantity_or_zero();
    let coefficient =
        lookup(LABOR_COEFFICIENTS, &task.trade_normalized()).unwrap_or(DEFAULT_LABOR_COEFFICIENT);

    match task.unit_normalized().as_str() {
        "sq ft" => quantity * coefficient,
        "linear ft" => quantity * coefficient * 0.5,
        "each" => quantity * 2.0,
        _ => (quantity * 0.1).max(1.0),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialLine {
    pub name: String,
    pub quantity: f64,
    pub unit_price: f64,
    pub total: f64,
}

impl MaterialLine {
    fn new(name: &str, quantity: f64, unit_price: f64) -> Self {
        Self {
            name: name.to_string(),
            quantity,
            unit_price,
            total: quantity * unit_price,
        }
    }
}

/// Bill of materials chosen by keywords in the task description.
pub fn materials_for(task: &Task, tier: EstimateTier) -> Vec<MaterialLine> {
    let q = task.quantity_or_zero();
    let m = tier_multiplier(tier);
    let description = task.description.to_lowercase();

    if description.contains("drywall") {
        vec![
            MaterialLine::new("5/8\" Drywall", q, 0.85 * m),
            MaterialLine::new("Joint compound", (q / 100.0).ceil(), 18.0 * m),
        ]
    } else if description.contains("paint") {
        let gallons = (q / 350.0).ceil();
        vec![
            MaterialLine::new("Primer", gallons, 35.0 * m),
            MaterialLine::new("Paint", gallons, 45.0 * m),
        ]
    } else if description.contains("shingle") || description.contains("roof") {
        let shingles = if tier == EstimateTier::Premium {
            "Architectural shingles"
        } else {
            "Standard shingles"
        };
        vec![
            MaterialLine::new(shingles, q, 1.5 * m),
            MaterialLine::new("Underlayment", q, 0.5 * m),
        ]
    } else if description.contains("carpet") || description.contains("flooring") {
        let flooring = if tier == EstimateTier::Premium {
            "Premium flooring"
        } else {
            "Standard flooring"
        };
        vec![MaterialLine::new(flooring, q, 5.5 * m)]
    } else {
        vec![MaterialLine::new("Materials", q, 5.0 * m)]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaborLine {
    pub hours: f64,
    pub rate: f64,
    pub total: f64,
}

/// Priced task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub task_id: String,
    pub description: String,
    pub quantity: f64,
    pub unit: String,
    pub trade: String,
    pub room: String,
    pub labor: LaborLine,
    pub materials: Vec<MaterialLine>,
    pub material_total: f64,
    pub subtotal: f64,
    pub overhead: f64,
    pub profit: f64,
    pub total: f64,
}

/// Price one task at `tier` in the region of `zip_code`.
pub fn price_task(
    task: &Task,
    zip_code: &str,
    tier: EstimateTier,
    room: &str,
    policy: &CostingPolicy,
) -> LineItem {
    let trade = task.trade_normalized();
    let rate = rate_band(zip_code, &trade).rate_for(tier);
    let hours = labor_hours(task);
    let labor_total = hours * rate;

    let materials = materials_for(task, tier);
    let material_total: f64 = materials.iter().map(|m| m.total).sum();

    let subtotal = labor_total + material_total;
    let overhead = subtotal * policy.overhead_rate;
    let profit = (subtotal + overhead) * policy.profit_rate;

    LineItem {
        task_id: task.task_id.clone(),
        description: task.description.clone(),
        quantity: task.quantity_or_zero(),
        unit: task.unit_normalized(),
        trade,
        room: room.to_string(),
        labor: LaborLine {
            hours,
            rate,
            total: labor_total,
        },
        materials,
        material_total,
        subtotal,
        overhead,
        profit,
        total: subtotal + overhead + profit,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomTotal {
    pub room: String,
    pub total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeTotal {
    pub trade: String,
    pub labor: f64,
    pub materials: f64,
    pub total: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TierComparison {
    pub economy: f64,
    pub standard: f64,
    pub premium: f64,
}

impl TierComparison {
    pub fn get(&self, tier: EstimateTier) -> f64 {
        match tier {
            EstimateTier::Economy => self.economy,
            EstimateTier::Standard => self.standard,
            EstimateTier::Premium => self.premium,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CostBreakdown {
    pub labor: f64,
    pub materials: f64,
    pub overhead: f64,
    pub profit: f64,
}

/// Cost estimator output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostEstimate {
    pub estimate_tier: EstimateTier,
    pub line_items: Vec<LineItem>,
    pub room_totals: Vec<RoomTotal>,
    pub trade_summary: Vec<TradeTotal>,
    pub tier_comparison: TierComparison,
    /// `tier_comparison` entry for the selected tier
    pub grand_total: f64,
    /// Sum of the selected tier's line items
    pub selected_tier_total: f64,
    pub breakdown: CostBreakdown,
    pub financial_notes: Vec<String>,
}

/// Every task of the assessment, priced at `tier`, in scope order.
fn price_all(
    assessment: &Assessment,
    zip_code: &str,
    tier: EstimateTier,
    policy: &CostingPolicy,
) -> Vec<LineItem> {
    assessment
        .scope_of_work
        .iter()
        .flat_map(|entry| {
            let room = assessment
                .damage_item(&entry.damage_item_id)
                .map(|d| d.location.as_str())
                .unwrap_or(UNKNOWN_ROOM);
            entry
                .tasks
                .iter()
                .map(move |task| price_task(task, zip_code, tier, room, policy))
        })
        .collect()
}

fn sum_totals(items: &[LineItem]) -> f64 {
    items.iter().map(|i| i.total).sum()
}

fn room_totals(items: &[LineItem]) -> Vec<RoomTotal> {
    let mut rooms: Vec<RoomTotal> = Vec::new();
    for item in items {
        match rooms.iter_mut().find(|r| r.room == item.room) {
            Some(room) => room.total += item.total,
            None => rooms.push(RoomTotal {
                room: item.room.clone(),
                total: item.total,
            }),
        }
    }
    rooms
}

fn trade_summary(items: &[LineItem]) -> Vec<TradeTotal> {
    let mut trades: Vec<TradeTotal> = Vec::new();
    for item in items {
        let idx = match trades.iter().position(|t| t.trade == item.trade) {
            Some(idx) => idx,
            None => {
                trades.push(TradeTotal {
                    trade: item.trade.clone(),
                    labor: 0.0,
                    materials: 0.0,
                    total: 0.0,
                });
                trades.len() - 1
            }
        };
        let entry = &mut trades[idx];
        entry.labor += item.labor.total;
        entry.materials += item.material_total;
        entry.total += item.total;
    }
    trades
}

fn breakdown(items: &[LineItem]) -> CostBreakdown {
    items.iter().fold(CostBreakdown::default(), |acc, i| CostBreakdown {
        labor: acc.labor + i.labor.total,
        materials: acc.materials + i.material_total,
        overhead: acc.overhead + i.overhead,
        profit: acc.profit + i.profit,
    })
}

fn financial_notes(zip_code: &str) -> Vec<String> {
    let mut notes = Vec::new();
    match zip_prefix(zip_code) {
        "77" => notes.push(
            "Regional adjustment: Houston market +8% above national average for roofing labor"
                .to_string(),
        ),
        "90" => notes
            .push("Regional adjustment: Los Angeles market +15% above national average".to_string()),
        _ => {}
    }
    notes.push("Material pricing based on Q4 2025 market data".to_string());
    notes
}

/// Price the whole assessment at `tier` and build the comparison figures.
pub fn estimate_costs(
    assessment: &Assessment,
    zip_code: &str,
    tier: EstimateTier,
    policy: &CostingPolicy,
) -> CostEstimate {
    let line_items = price_all(assessment, zip_code, tier, policy);
    let selected_tier_total = sum_totals(&line_items);

    let total_at = |t: EstimateTier| {
        if t == tier {
            selected_tier_total
        } else {
            sum_totals(&price_all(assessment, zip_code, t, policy))
        }
    };

    let tier_comparison = match policy.tier_comparison {
        TierComparisonMode::Scalar => {
            let standard = total_at(EstimateTier::Standard);
            TierComparison {
                economy: standard * policy.economy_factor,
                standard,
                premium: standard * policy.premium_factor,
            }
        }
        TierComparisonMode::Recompute => TierComparison {
            economy: total_at(EstimateTier::Economy),
            standard: total_at(EstimateTier::Standard),
            premium: total_at(EstimateTier::Premium),
        },
    };

    CostEstimate {
        estimate_tier: tier,
        room_totals: room_totals(&line_items),
        trade_summary: trade_summary(&line_items),
        breakdown: breakdown(&line_items),
        grand_total: tier_comparison.get(tier),
        tier_comparison,
        selected_tier_total,
        financial_notes: financial_notes(zip_code),
        line_items,
    }
}

/// Stage 4 wrapper around [`estimate_costs`].
pub struct CostEstimator {
    policy: Arc<PolicyConfig>,
}

impl CostEstimator {
    pub fn new(policy: Arc<PolicyConfig>) -> Self {
        Self { policy }
    }
}

#[async_trait]
impl Stage for CostEstimator {
    fn name(&self) -> &'static str {
        "cost"
    }

    fn status(&self) -> JobStatus {
        JobStatus::Costing
    }

    async fn process(&self, mut dossier: Dossier, ctx: &StageContext) -> Result<StageOutcome> {
        let estimate = estimate_costs(
            dossier.assessment()?,
            ctx.zip_code(),
            ctx.tier,
            &self.policy.costing,
        );

        info!(
            job_id = %ctx.job_id,
            tier = %estimate.estimate_tier,
            line_items = estimate.line_items.len(),
            grand_total = estimate.grand_total,
            "Cost estimate complete"
        );

        let output = serde_json::to_value(&estimate)?;
        dossier.cost = Some(estimate);
        Ok(StageOutcome::proceed(dossier, output))
    }
}
