use chaincrf::train::Trainer;
use chaincrf::Model;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // RUST_LOG=info shows optimizer progress
    env_logger::init();

    println!("CRF Training and Tagging Example");
    println!("=================================\n");

    let data = vec![
        (
            vec![vec!["walk", "shop"], vec!["walk"], vec!["walk", "clean"]],
            vec!["sunny", "sunny", "sunny"],
        ),
        (
            vec![vec!["shop", "clean"], vec!["clean"], vec!["clean", "shop"]],
            vec!["rainy", "rainy", "rainy"],
        ),
        (
            vec![vec!["walk", "shop"], vec!["clean"], vec!["walk"]],
            vec!["sunny", "rainy", "sunny"],
        ),
    ];

    let mut trainer = Trainer::new();
    for (xseq, yseq) in &data {
        trainer.append(xseq, yseq)?;
    }
    println!("Training data:");
    println!("  Sequences: {}", trainer.num_instances());
    println!("  Labels: {}", trainer.num_labels());
    println!("  Attributes: {}\n", trainer.num_attrs());

    println!("Setting parameters:");
    trainer.set("c1", "0.0")?;
    trainer.set("c2", "1.0")?;
    trainer.set("max_iterations", "100")?;
    println!("  L1 regularization (c1): {}", trainer.get("c1")?);
    println!("  L2 regularization (c2): {}", trainer.get("c2")?);
    println!("  Max iterations: {}\n", trainer.get("max_iterations")?);

    let model_path = std::env::temp_dir().join("example_model.json");
    println!("Training model...");
    trainer.train_to(&model_path)?;
    println!("Saved to {}\n", model_path.display());

    let model = Model::load(&model_path)?;
    let tagger = model.tagger()?;

    let test_seq = vec![vec!["walk"], vec!["shop"], vec!["clean"]];
    let result = tagger.tag(&test_seq)?;
    println!("Input: walk -> shop -> clean");
    println!("Predicted labels: {:?}", result);
    println!("Probability: {:.4}", tagger.probability(&test_seq, &result)?);

    for (t, row) in tagger.marginals(&test_seq)?.iter().enumerate() {
        let dist: Vec<String> = row
            .iter()
            .enumerate()
            .map(|(lid, p)| format!("{}={:.3}", model.to_label(lid as u32).unwrap_or("?"), p))
            .collect();
        println!("  position {}: {}", t, dist.join(", "));
    }

    Ok(())
}
