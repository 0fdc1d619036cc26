use chaincrf::train::{LineSearchAlgorithm, Trainer};

#[test]
fn test_c1_negative_validation() {
    let mut trainer = Trainer::new();

    // c1 must be non-negative
    let result = trainer.set("c1", "-1.0");
    assert!(result.is_err());
    assert_eq!(result.unwrap_err().to_string(), "c1 must be non-negative");

    assert!(trainer.set("c1", "0.0").is_ok());
    assert!(trainer.set("c1", "1.0").is_ok());
}

#[test]
fn test_c2_negative_validation() {
    let mut trainer = Trainer::new();

    let result = trainer.set("c2", "-1.0");
    assert!(result.is_err());
    assert_eq!(result.unwrap_err().to_string(), "c2 must be non-negative");

    assert!(trainer.set("c2", "0.0").is_ok());
    assert!(trainer.set("c2", "1.0").is_ok());
}

#[test]
fn test_epsilon_validation() {
    let mut trainer = Trainer::new();

    assert!(trainer.set("epsilon", "0.0").is_ok());

    let result = trainer.set("epsilon", "-0.001");
    assert!(result.is_err());
    assert_eq!(
        result.unwrap_err().to_string(),
        "epsilon must be non-negative"
    );

    assert!(trainer.set("epsilon", "0.001").is_ok());
    assert!(trainer.set("epsilon", "1e-5").is_ok());
}

#[test]
fn test_iteration_limits() {
    let mut trainer = Trainer::new();

    let result = trainer.set("max_iterations", "0");
    assert_eq!(
        result.unwrap_err().to_string(),
        "max_iterations must be at least 1"
    );
    assert!(trainer.set("max_iterations", "50").is_ok());
    assert_eq!(trainer.params().max_iterations(), 50);

    assert!(trainer.set("max_linesearch", "0").is_err());
    assert!(trainer.set("period", "0").is_ok());
}

#[test]
fn test_linesearch_names() {
    let mut trainer = Trainer::new();

    trainer.set("linesearch", "Backtracking").unwrap();
    assert_eq!(
        trainer.params().linesearch(),
        LineSearchAlgorithm::BacktrackingWolfe
    );
    assert_eq!(trainer.get("linesearch").unwrap(), "BacktrackingWolfe");
    assert!(trainer.set("linesearch", "GradientDescent").is_err());
}

#[test]
fn test_invalid_parameter_values() {
    let mut trainer = Trainer::new();

    // Invalid number format
    assert!(trainer.set("c1", "not_a_number").is_err());
    assert!(trainer.set("c2", "abc").is_err());
    assert!(trainer.set("epsilon", "xyz").is_err());
    assert!(trainer.set("max_iterations", "-3").is_err());
}

#[test]
fn test_unknown_parameter() {
    let mut trainer = Trainer::new();

    let result = trainer.set("unknown_param", "1.0");
    assert!(result.is_err());
    assert!(result
        .unwrap_err()
        .to_string()
        .contains("unknown parameter"));
    assert!(trainer.get("num_memories").is_err());
}
