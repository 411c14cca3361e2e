//! # Shopping list aggregation
//!
//! Turns a user's cart into one plain-text grocery list. Quantities are
//! summed per (ingredient name, measurement unit) pair across every recipe
//! in the cart, so two recipes that both need "сахар (г)" collapse into a
//! single line.
//!
//! Ordering is part of the contract: ingredient totals are sorted by
//! (name, unit) and recipe sources by name, independent of the order the
//! storage layer returned them in. The aggregation key is the raw stored
//! string; title-casing happens only at render time, so names differing in
//! case stay separate lines.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;

/// One ingredient line of a recipe, already resolved against the catalog.
#[derive(Debug, Clone)]
pub struct IngredientLine {
    pub name: String,
    pub unit: String,
    pub amount: i32,
}

/// A cart entry resolved to its recipe name and ingredient lines.
#[derive(Debug, Clone)]
pub struct CartRecipe {
    pub recipe_name: String,
    pub lines: Vec<IngredientLine>,
}

/// Aggregated totals plus the set of source recipe names.
#[derive(Debug, Default)]
pub struct ShoppingReport {
    totals: BTreeMap<(String, String), i64>,
    recipes: BTreeSet<String>,
}

pub fn aggregate(cart: impl IntoIterator<Item = CartRecipe>) -> ShoppingReport {
    let mut report = ShoppingReport::default();

    for entry in cart {
        report.recipes.insert(entry.recipe_name);

        for line in entry.lines {
            let total = report.totals.entry((line.name, line.unit)).or_insert(0);
            *total += i64::from(line.amount);
        }
    }

    report
}

impl ShoppingReport {
    /// Totals in ascending (name, unit) order.
    pub fn totals(&self) -> impl Iterator<Item = (&str, &str, i64)> {
        self.totals
            .iter()
            .map(|((name, unit), total)| (name.as_str(), unit.as_str(), *total))
    }

    /// Source recipe names in ascending order.
    pub fn recipe_names(&self) -> impl Iterator<Item = &str> {
        self.recipes.iter().map(String::as_str)
    }

    /// Renders the report for the given calendar date.
    ///
    /// The date is injected by the caller (the handler passes "today") so
    /// the output is fully deterministic for a fixed cart and date.
    pub fn render(&self, date: NaiveDate) -> String {
        let mut lines = vec![
            format!("Список покупок ({}):", date.format("%Y-%m-%d")),
            "Ингредиенты:".to_string(),
        ];

        for (idx, (name, unit, total)) in self.totals().enumerate() {
            lines.push(format!(
                "{}. {} ({}) — {}",
                idx + 1,
                title_case(name),
                unit,
                total
            ));
        }

        lines.push("\nИсточники рецептов:".to_string());
        for (idx, name) in self.recipe_names().enumerate() {
            lines.push(format!("{}. {}", idx + 1, name));
        }

        lines.join("\n")
    }
}

/// Uppercases the first letter of every alphabetic run, lowercases the
/// rest. Display-only; aggregation keys keep their stored casing.
pub fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut at_word_start = true;

    for ch in text.chars() {
        if ch.is_alphabetic() {
            if at_word_start {
                out.extend(ch.to_uppercase());
            } else {
                out.extend(ch.to_lowercase());
            }
            at_word_start = false;
        } else {
            out.push(ch);
            at_word_start = true;
        }
    }

    out
}
