//! Plain-text rendering for reports, classifications, and the catalog.

use labelscan_ai::EvaluationReport;
use labelscan_core::{AdditiveEntry, AllergenEntry, Catalog, DetectionResult};
use labelscan_host::Classification;

// ── Evaluation ──

/// Print accuracy and a per-class precision/recall/F1 table.
pub fn print_report(report: &EvaluationReport) {
    println!("Accuracy: {:.4}", report.accuracy);
    println!();
    println!(
        "  {:<26} {:>9} {:>9} {:>9} {:>9}",
        "", "precision", "recall", "f1-score", "support"
    );
    for class in &report.classes {
        println!(
            "  {:<26} {:>9.2} {:>9.2} {:>9.2} {:>9}",
            class.label, class.precision, class.recall, class.f1, class.support
        );
    }
    println!();
    println!(
        "  {:<26} {:>9} {:>9} {:>9.2} {:>9}",
        "accuracy", "", "", report.accuracy, report.total
    );
    for (name, avg) in [
        ("macro avg", &report.macro_avg),
        ("weighted avg", &report.weighted_avg),
    ] {
        println!(
            "  {:<26} {:>9.2} {:>9.2} {:>9.2} {:>9}",
            name, avg.precision, avg.recall, avg.f1, report.total
        );
    }
}

// ── Classification ──

pub fn print_classification(result: &Classification) {
    match &result.prediction {
        Ok(p) => println!("Label: {} (p = {:.3})", p.label, p.probability),
        Err(e) => println!("Label: unavailable ({e})"),
    }
    println!();
    print_detections(&result.detections);
}

fn print_detections(detections: &DetectionResult) {
    if detections.is_empty() {
        println!("No allergens or additives detected.");
        return;
    }
    if !detections.allergens.is_empty() {
        println!("Allergens");
        for a in &detections.allergens {
            println!("  {}", a.name);
            println!("    {:<24} {}", "alternative", a.alternative);
            println!("    {:<24} {}", "remediation", a.remediation);
        }
    }
    if !detections.additives.is_empty() {
        println!("Additives");
        for a in &detections.additives {
            println!("  {:<26} {}", a.code, a.description);
        }
    }
}

// ── Catalog ──

pub fn print_catalog(catalog: &Catalog) {
    println!("=== Catalog v{} ===", catalog.version);
    println!();
    println!("Allergens ({})", catalog.allergens.len());
    for entry in catalog.allergens.entries() {
        println!("  {:<26} {}", entry.keyword, entry.name);
    }
    println!();
    println!("Additives ({})", catalog.additives.len());
    for entry in catalog.additives.entries() {
        println!("  {:<26} {}", entry.code, entry.description);
    }
}

pub fn print_hit(allergen: Option<&AllergenEntry>, additive: Option<&AdditiveEntry>) {
    if let Some(entry) = allergen {
        println!("Allergen {} ({})", entry.name, entry.keyword);
        println!("  {:<26} {}", "alternative", entry.alternative);
        println!("  {:<26} {}", "remediation", entry.remediation);
    }
    if let Some(entry) = additive {
        println!("Additive {}", entry.code);
        println!("  {:<26} {}", "description", entry.description);
    }
}
