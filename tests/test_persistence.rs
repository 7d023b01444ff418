// Tests for saving and restoring layers, networks and trainers.
//
// A restored object must behave exactly like the original: identical forward
// outputs for layers, and an identical training trajectory for trainers.

use neural_mbgd::dataset::MemoryDataset;
use neural_mbgd::layers::Layer;
use neural_mbgd::learn::{BPLayer, Mbgd, MetaParams};
use neural_mbgd::model::NnModel;
use neural_mbgd::objective::Objective;
use neural_mbgd::optimizers::GradientDescentType;
use neural_mbgd::persistence::{self, from_json, to_json, Persist, Record};
use neural_mbgd::transfer::Transfer;
use neural_mbgd::utils::SeededRng;
use neural_mbgd::NetError;
use tempfile::TempDir;

fn data() -> MemoryDataset {
    MemoryDataset::from_examples(
        &[vec![0.2, 0.9, -0.4], vec![-0.7, 0.1, 0.5], vec![0.3, -0.3, 0.8]],
        &[vec![1.0, 0.0], vec![0.0, 1.0], vec![1.0, 0.0]],
    )
    .unwrap()
}

fn trained_pair(gradient_descent: GradientDescentType) -> (NnModel, Mbgd) {
    let mut rng = SeededRng::new(99);
    let mut model =
        NnModel::build(3, &[(4, Transfer::TanH), (2, Transfer::Softmax)], &mut rng).unwrap();
    let params = MetaParams::default()
        .with_learning_rate(0.1)
        .with_gradient_descent(gradient_descent)
        .with_weight_decay(0.01);
    let mut mbgd = Mbgd::from_nn_model(&model, &params).unwrap();
    mbgd.train(&mut model, &mut data(), Objective::MulticlassLogLoss, 3, 5)
        .unwrap();
    (model, mbgd)
}

mod round_trip_tests {
    use super::*;

    #[test]
    fn test_layer_forward_identical_after_round_trip() {
        let mut rng = SeededRng::new(12);
        for transfer in Transfer::ALL {
            let layer = Layer::new_random(3, 3, transfer, &mut rng).unwrap();
            let restored: Layer = from_json(&to_json(&layer).unwrap()).unwrap();
            let input = [0.123456789, -2.5, 1.0 / 3.0];
            assert_eq!(restored.forward(&input).unwrap(), layer.forward(&input).unwrap());
        }
    }

    #[test]
    fn test_training_continues_identically_after_round_trip() {
        for gd in [
            GradientDescentType::Sgd,
            GradientDescentType::Nag,
            GradientDescentType::RmsProp,
        ] {
            let (mut model, mut mbgd) = trained_pair(gd);
            let mut model_copy: NnModel = from_json(&to_json(&model).unwrap()).unwrap();
            let mut mbgd_copy: Mbgd = from_json(&to_json(&mbgd).unwrap()).unwrap();
            assert_eq!(mbgd_copy, mbgd);

            let mut a = data();
            let mut b = data();
            let loss = mbgd
                .train_one_batch(&mut model, &mut a, Objective::MulticlassLogLoss, 3)
                .unwrap();
            let loss_copy = mbgd_copy
                .train_one_batch(&mut model_copy, &mut b, Objective::MulticlassLogLoss, 3)
                .unwrap();

            assert_eq!(loss, loss_copy);
            assert_eq!(model_copy, model);
            assert_eq!(mbgd_copy, mbgd);
        }
    }

    #[test]
    fn test_trainer_saved_mid_batch_finishes_identically() {
        let mut rng = SeededRng::new(31);
        let mut layer = Layer::new_random(3, 2, Transfer::Sigmoid, &mut rng).unwrap();
        let params = MetaParams::default()
            .with_learning_rate(0.3)
            .with_gradient_descent(GradientDescentType::Nag)
            .with_momentum(0.7);
        let mut bp = BPLayer::from_layer(&layer, &params).unwrap();
        let input = [0.4, -0.9, 0.2];
        let target = [1.0, 0.0];

        let backprop = |bp: &mut BPLayer, layer: &mut Layer| {
            bp.start_batch(layer).unwrap();
            let output = layer.forward(&input).unwrap();
            bp.backprop_for_output_layer(layer, &input, &output, &target, Objective::LogLoss)
                .unwrap();
        };

        // A completed batch first, so the next start_batch applies a look-ahead.
        backprop(&mut bp, &mut layer);
        bp.finish_batch(&mut layer).unwrap();
        backprop(&mut bp, &mut layer);

        let mut restored: BPLayer = from_json(&to_json(&bp).unwrap()).unwrap();
        let mut restored_layer: Layer = from_json(&to_json(&layer).unwrap()).unwrap();
        assert!(restored.is_batch_started());
        assert_eq!(restored, bp);

        bp.finish_batch(&mut layer).unwrap();
        restored.finish_batch(&mut restored_layer).unwrap();
        assert_eq!(restored_layer, layer);
        assert_eq!(restored, bp);
    }

    #[test]
    fn test_save_and_load_files() {
        let dir = TempDir::new().unwrap();
        let (model, mbgd) = trained_pair(GradientDescentType::Nag);

        let model_path = dir.path().join("model.json");
        let trainer_path = dir.path().join("trainer.json");
        persistence::save(&model, &model_path).unwrap();
        persistence::save(&mbgd, &trainer_path).unwrap();

        let loaded_model: NnModel = persistence::load(&model_path).unwrap();
        let loaded_trainer: Mbgd = persistence::load(&trainer_path).unwrap();
        assert_eq!(loaded_model.layers(), model.layers());
        assert_eq!(loaded_trainer, mbgd);
    }
}

mod error_tests {
    use super::*;

    #[test]
    fn test_loading_wrong_kind_is_type_error() {
        let (model, mbgd) = trained_pair(GradientDescentType::Sgd);
        assert!(matches!(
            from_json::<Mbgd>(&to_json(&model).unwrap()),
            Err(NetError::Type(_))
        ));
        assert!(matches!(
            NnModel::from_record(mbgd.to_record()),
            Err(NetError::Type(_))
        ));
        let bp = mbgd.layer(0).unwrap().clone();
        assert!(matches!(
            Layer::from_record(bp.to_record()),
            Err(NetError::Type(_))
        ));
    }

    #[test]
    fn test_record_kinds() {
        let (model, mbgd) = trained_pair(GradientDescentType::Sgd);
        assert_eq!(model.to_record().kind(), "nn_model");
        assert_eq!(mbgd.to_record().kind(), "mbgd");
        assert_eq!(model.layer(0).to_record().kind(), "layer");
        assert_eq!(mbgd.layer(1).unwrap().to_record().kind(), "bp_layer");
    }

    #[test]
    fn test_malformed_input_rejected() {
        assert!(matches!(
            from_json::<Layer>("{\"kind\": \"layer\""),
            Err(NetError::Json(_))
        ));
        // Weight data does not match the declared shape.
        let bad = r#"{"kind":"layer","transfer":"tanh","weights":{"shape":[2,2],"data":[1.0]}}"#;
        assert!(from_json::<Layer>(bad).is_err());
    }

    #[test]
    fn test_inconsistent_network_rejected() {
        let record: Record = serde_json::from_str(
            r#"{"kind":"nn_model","layers":[
                {"transfer":"tanh","weights":{"shape":[3,2],"data":[0,0,0,0,0,0]}},
                {"transfer":"linear","weights":{"shape":[4,1],"data":[0,0,0,0]}}
            ]}"#,
        )
        .unwrap();
        assert!(matches!(
            NnModel::from_record(record),
            Err(NetError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            persistence::load::<BPLayer>(dir.path().join("absent.json")),
            Err(NetError::Io(_))
        ));
    }
}
