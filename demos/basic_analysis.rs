//! Basic analysis example demonstrating the two-stage workflow.
//!
//! Run with `RUST_LOG`-style verbosity controlled by the default subscriber.

use analytical_map::{
    load_from_string, loader::load_detections_from_string, metrics::iou::calculate_iou,
    report::write_final_results, AnalysisParams, AreaBucket, BoundingBox, ErrorType, Evaluator,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    println!("=== Analytical mAP Example ===\n");

    // Example 1: IoU Calculation
    println!("1. IoU Calculation (pixel-inclusive)");
    let bbox1 = BoundingBox::new(10.0, 10.0, 50.0, 50.0);
    let bbox2 = BoundingBox::new(30.0, 30.0, 50.0, 50.0);
    println!("   IoU between overlapping boxes: {:.4}", calculate_iou(&bbox1, &bbox2));
    println!();

    // Example 2: Load ground truth and detections
    println!("2. Loading Inputs");
    let ground_truth_json = r#"{
        "images": [
            {"id": 1, "file_name": "image1.jpg", "height": 480, "width": 640}
        ],
        "annotations": [
            {"id": 1, "image_id": 1, "category_id": 1, "bbox": [100.0, 100.0, 200.0, 150.0]},
            {"id": 2, "image_id": 1, "category_id": 2, "bbox": [350.0, 200.0, 100.0, 120.0]},
            {"id": 3, "image_id": 1, "category_id": 1, "bbox": [20.0, 300.0, 60.0, 60.0]},
            {"id": 4, "image_id": 1, "category_id": 2, "bbox": [500.0, 20.0, 30.0, 30.0]}
        ],
        "categories": [
            {"id": 1, "name": "person", "supercategory": "human"},
            {"id": 2, "name": "car", "supercategory": "vehicle"}
        ]
    }"#;
    let detections_json = r#"[
        {"image_id": 1, "category_id": 1, "bbox": [105.0, 98.0, 195.0, 155.0], "score": 0.95},
        {"image_id": 1, "category_id": 1, "bbox": [100.0, 102.0, 200.0, 148.0], "score": 0.60},
        {"image_id": 1, "category_id": 1, "bbox": [348.0, 198.0, 105.0, 125.0], "score": 0.87},
        {"image_id": 1, "category_id": 1, "bbox": [40.0, 300.0, 60.0, 60.0], "score": 0.55},
        {"image_id": 1, "category_id": 2, "bbox": [600.0, 400.0, 30.0, 30.0], "score": 0.42}
    ]"#;

    let ground_truth = load_from_string(ground_truth_json)?;
    let detections = load_detections_from_string(detections_json)?;
    println!("   Loaded {} ground truths", ground_truth.annotations.len());
    println!("   Loaded {} detections", detections.len());
    println!();

    // Example 3: Classification
    println!("3. Classifying Records");
    let mut evaluator = Evaluator::new(&ground_truth, &detections, AnalysisParams::default())?;
    evaluator.evaluate()?;

    println!("   Ground truths:");
    for record in evaluator.ground_truths() {
        println!("   ├─ id={} -> {}", record.id, label(record.error_type()));
    }
    println!("   Detections:");
    for record in evaluator.detections() {
        println!(
            "   ├─ id={} score={:.2} -> {}",
            record.id,
            record.confidence(),
            label(record.error_type())
        );
    }
    println!("   {}", evaluator.stats().summary_string());
    println!();

    // Example 4: Aggregation
    println!("4. Aggregating");
    let results = evaluator.calculate()?;
    println!("   mAP: {:.4}", results.map());
    for (precision, recall) in results.precision.iter().zip(&results.recall) {
        println!(
            "   ├─ {:<8} precision {:.4} recall {:.4}",
            precision.category, precision.score, recall.score
        );
    }
    println!();

    // Example 5: Attribution
    println!("5. AP Lost Per Error Type (all categories, all areas)");
    if let Some(all) = results.ap_for(None, AreaBucket::All) {
        println!("   AP: {:.4}", all.ap);
        for error_type in ErrorType::ALL {
            let share = all.ratio.get(&error_type).copied().unwrap_or(0.0);
            println!("   ├─ {:<5} {:.4}", error_type.to_string(), share);
        }
    }
    println!();

    // Example 6: Final results as JSON
    println!("6. Final Results JSON (truncated)");
    let mut buffer = Vec::new();
    write_final_results(&mut buffer, &evaluator.final_results(results))?;
    let json = String::from_utf8(buffer)?;
    for line in json.lines().take(12) {
        println!("   {}", line);
    }
    println!("   ...");
    println!();

    println!("=== Example Complete ===");

    Ok(())
}

fn label(error_type: Option<ErrorType>) -> String {
    error_type.map_or_else(|| "unset".to_string(), |t| t.to_string())
}
