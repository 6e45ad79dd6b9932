use super::*;

fn product(chain: &[f64]) -> f64 {
    chain.iter().product()
}

#[test]
fn in_range_speed_is_a_single_stage() {
    assert_eq!(tempo_chain(0.5).unwrap(), vec![0.5]);
    assert_eq!(tempo_chain(1.25).unwrap(), vec![1.25]);
    assert_eq!(tempo_chain(2.0).unwrap(), vec![2.0]);
}

#[test]
fn eighth_speed_is_three_halvings() {
    assert_eq!(tempo_chain(0.125).unwrap(), vec![0.5, 0.5, 0.5]);
}

#[test]
fn fast_speeds_split_into_doublings() {
    let chain = tempo_chain(5.0).unwrap();
    assert_eq!(&chain[..2], &[2.0, 2.0]);
    assert!((chain[2] - 1.25).abs() < 1e-12);
}

#[test]
fn every_stage_is_in_range_and_product_matches() {
    for s in [0.01, 0.1, 0.3, 0.49, 0.51, 1.0, 1.99, 2.01, 3.3, 7.0, 16.0, 100.0] {
        let chain = tempo_chain(s).unwrap();
        assert!(!chain.is_empty());
        assert!(
            chain.iter().all(|k| (TEMPO_MIN..=TEMPO_MAX).contains(k)),
            "{s}: {chain:?}"
        );
        assert!((product(&chain) - s).abs() < 1e-9, "{s}: {chain:?}");
    }
}

#[test]
fn non_positive_speed_is_rejected() {
    assert!(tempo_chain(0.0).is_err());
    assert!(tempo_chain(-1.0).is_err());
    assert!(tempo_chain(f64::NAN).is_err());
}

#[test]
fn filter_and_description() {
    let chain = [0.5, 0.5, 0.8];
    assert_eq!(atempo_filter(&chain), "atempo=0.5,atempo=0.5,atempo=0.8");
    assert_eq!(describe_chain(&chain), "0.5*0.5*0.8");
}
