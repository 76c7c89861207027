use super::{constant_bottom, init_tracing};
use crate::assert_err;
use crate::nn::{Backend, Blob, Context, DropoutLayer, LayerError, LayerParameter, TraitLayer};
use crate::tensor::Tensor;
use approx::assert_abs_diff_eq;

fn context(backend: Backend) -> Context {
    let mut ctx = Context::new_with_seed(1703);
    ctx.set_backend(backend);
    ctx
}

fn dropout(ratio: f32) -> DropoutLayer {
    DropoutLayer::new(LayerParameter::new().with_dropout_ratio(ratio))
}

/// 元素取自 [1, 2] 的随机输入，不含 0，便于区分“被丢弃”与“原值为零”
fn random_bottom(ctx: &mut Context, shape: &[usize]) -> Blob {
    Blob::from_data(Tensor::new_uniform(1., 2., shape, ctx.rng_mut()))
}

fn setup(layer: &mut DropoutLayer, bottom: &Blob) -> Result<Blob, LayerError> {
    let mut top = Blob::default();
    layer.setup(&[bottom], &mut [&mut top])?;
    Ok(top)
}

#[test]
fn test_setup() -> Result<(), LayerError> {
    init_tracing();
    let bottom = constant_bottom();
    let mut layer = dropout(0.5);
    let top = setup(&mut layer, &bottom)?;

    assert_eq!(top.shape(), bottom.shape());
    assert_abs_diff_eq!(layer.scale(), 2.);
    assert_eq!(layer.mask(), None);
    assert_eq!(layer.type_name(), "Dropout");
    assert!(layer.supports_in_place());

    let mut layer = dropout(0.2);
    setup(&mut layer, &bottom)?;
    assert_abs_diff_eq!(layer.scale(), 1.25);
    Ok(())
}

#[test]
fn test_invalid_ratio() {
    let bottom = constant_bottom();
    let result = setup(&mut dropout(1.), &bottom);
    assert_err!(
        result,
        LayerError::InvalidConfiguration("dropout_ratio须在[0, 1)内，得到1")
    );

    let result = setup(&mut dropout(-0.1), &bottom);
    assert_err!(
        result,
        LayerError::InvalidConfiguration("dropout_ratio须在[0, 1)内，得到-0.1")
    );
}

#[test]
fn test_setup_rejects_empty_input() {
    let bottom = Blob::new(2, 0, 6, 5);
    let result = setup(&mut dropout(0.5), &bottom);
    assert_err!(
        result,
        LayerError::ShapeMismatch { message, .. } if message == "Dropout层的输入不能为空"
    );
}

fn train_forward_scales_kept(backend: Backend) -> Result<(), LayerError> {
    let mut ctx = context(backend);
    let bottom = random_bottom(&mut ctx, &[2, 3, 6, 5]);
    let mut layer = dropout(0.5);
    let mut top = setup(&mut layer, &bottom)?;
    layer.forward(&mut ctx, &[&bottom], &mut [&mut top])?;

    let mask = layer.mask().expect("训练阶段 forward 后应有掩码");
    assert_eq!(mask.len(), bottom.count());
    let pairs = bottom.data().data_as_slice().iter().zip(top.data().data_as_slice());
    for ((&x, &y), &keep) in pairs.zip(mask) {
        if keep {
            assert_abs_diff_eq!(y, x * 2.);
        } else {
            assert_eq!(y, 0.);
        }
    }
    // 非原地计算不改动输入
    assert!(bottom.data().data_as_slice().iter().all(|&x| x >= 1.));
    Ok(())
}
test_both_backends!(test_train_forward_scales_kept, train_forward_scales_kept);

#[test]
fn test_kept_fraction() -> Result<(), LayerError> {
    let mut ctx = Context::new_with_seed(1703);
    let bottom = Blob::from_data(Tensor::full(1., &[1, 1, 100, 100]));
    let mut layer = dropout(0.5);
    let mut top = setup(&mut layer, &bottom)?;
    layer.forward(&mut ctx, &[&bottom], &mut [&mut top])?;

    let kept = layer.mask().unwrap().iter().filter(|&&k| k).count();
    let fraction = kept as f32 / bottom.count() as f32;
    assert_abs_diff_eq!(fraction, 0.5, epsilon = 0.05);
    Ok(())
}

#[test]
fn test_zero_ratio_is_identity() -> Result<(), LayerError> {
    let mut ctx = Context::new_with_seed(1703);
    let bottom = random_bottom(&mut ctx, &[2, 3, 6, 5]);
    let mut layer = dropout(0.);
    let mut top = setup(&mut layer, &bottom)?;
    layer.forward(&mut ctx, &[&bottom], &mut [&mut top])?;

    assert_abs_diff_eq!(layer.scale(), 1.);
    assert!(layer.mask().unwrap().iter().all(|&k| k));
    assert_eq!(top.data(), bottom.data());
    Ok(())
}

fn eval_is_identity(backend: Backend) -> Result<(), LayerError> {
    let mut ctx = context(backend);
    let mut bottom = random_bottom(&mut ctx, &[2, 3, 6, 5]);
    let mut layer = dropout(0.5);
    let mut top = setup(&mut layer, &bottom)?;

    // 先在训练阶段 forward 一次，切到评估阶段后掩码被清除
    layer.forward(&mut ctx, &[&bottom], &mut [&mut top])?;
    ctx.set_eval_mode();
    layer.forward(&mut ctx, &[&bottom], &mut [&mut top])?;
    assert_eq!(top.data(), bottom.data());
    assert_eq!(layer.mask(), None);

    top.diff_mut().fill(3.);
    layer.backward(&mut ctx, &[&top], true, &mut [&mut bottom])?;
    assert_eq!(bottom.diff(), top.diff());
    Ok(())
}
test_both_backends!(test_eval_is_identity, eval_is_identity);

fn backward_applies_mask(backend: Backend) -> Result<(), LayerError> {
    let mut ctx = context(backend);
    let mut bottom = random_bottom(&mut ctx, &[2, 3, 6, 5]);
    let mut layer = dropout(0.5);
    let mut top = setup(&mut layer, &bottom)?;
    layer.forward(&mut ctx, &[&bottom], &mut [&mut top])?;

    top.diff_mut().fill(1.);
    layer.backward(&mut ctx, &[&top], true, &mut [&mut bottom])?;
    let mask = layer.mask().unwrap();
    for (&grad, &keep) in bottom.diff().data_as_slice().iter().zip(mask) {
        assert_eq!(grad, if keep { 2. } else { 0. });
    }
    Ok(())
}
test_both_backends!(test_backward_applies_mask, backward_applies_mask);

#[test]
fn test_same_seed_same_mask_across_backends() -> Result<(), LayerError> {
    let bottom = constant_bottom();
    let mut outputs = Vec::new();
    for backend in [Backend::Sequential, Backend::Parallel, Backend::Sequential] {
        let mut ctx = context(backend);
        let mut layer = dropout(0.5);
        let mut top = setup(&mut layer, &bottom)?;
        layer.forward(&mut ctx, &[&bottom], &mut [&mut top])?;
        outputs.push((layer.mask().unwrap().to_vec(), top.data().clone()));
    }
    assert_eq!(outputs[0], outputs[1]);
    assert_eq!(outputs[0], outputs[2]);

    // 不同种子得到不同掩码（180 个元素全部相同的概率可忽略）
    let mut ctx = Context::new_with_seed(1704);
    let mut layer = dropout(0.5);
    let mut top = setup(&mut layer, &bottom)?;
    layer.forward(&mut ctx, &[&bottom], &mut [&mut top])?;
    assert_ne!(layer.mask().unwrap(), outputs[0].0.as_slice());
    Ok(())
}

fn in_place(backend: Backend) -> Result<(), LayerError> {
    let mut ctx = context(backend);
    let original = random_bottom(&mut ctx, &[2, 3, 6, 5]);
    let mut blob = original.clone();
    let mut layer = dropout(0.5);
    layer.setup_in_place(&mut blob)?;
    layer.forward_in_place(&mut ctx, &mut blob)?;

    let mask = layer.mask().unwrap().to_vec();
    let values = original.data().data_as_slice().iter().zip(blob.data().data_as_slice());
    for ((&x, &y), &keep) in values.zip(&mask) {
        assert_abs_diff_eq!(y, if keep { x * 2. } else { 0. });
    }

    blob.diff_mut().fill(1.);
    layer.backward_in_place(&mut ctx, true, &mut blob)?;
    for (&grad, &keep) in blob.diff().data_as_slice().iter().zip(&mask) {
        assert_eq!(grad, if keep { 2. } else { 0. });
    }
    Ok(())
}
test_both_backends!(test_in_place, in_place);

#[test]
fn test_in_place_matches_out_of_place() -> Result<(), LayerError> {
    let bottom = constant_bottom();

    let mut ctx = Context::new_with_seed(1703);
    let mut layer = dropout(0.3);
    let mut top = setup(&mut layer, &bottom)?;
    layer.forward(&mut ctx, &[&bottom], &mut [&mut top])?;

    let mut ctx = Context::new_with_seed(1703);
    let mut blob = bottom.clone();
    let mut layer = dropout(0.3);
    layer.setup_in_place(&mut blob)?;
    layer.forward_in_place(&mut ctx, &mut blob)?;

    assert_eq!(blob.data(), top.data());
    Ok(())
}

#[test]
fn test_backward_requires_train_forward() -> Result<(), LayerError> {
    let mut ctx = Context::new_with_seed(1703);
    let mut bottom = constant_bottom();
    let mut layer = dropout(0.5);
    let mut top = setup(&mut layer, &bottom)?;

    let result = layer.backward(&mut ctx, &[&top], true, &mut [&mut bottom]);
    assert_err!(
        result,
        LayerError::PreconditionViolation("Dropout 层 backward 之前须先在训练阶段 forward")
    );

    // 评估阶段的 forward 不产生掩码，回到训练阶段后仍不能 backward
    ctx.set_eval_mode();
    layer.forward(&mut ctx, &[&bottom], &mut [&mut top])?;
    ctx.set_train_mode();
    let result = layer.backward(&mut ctx, &[&top], true, &mut [&mut bottom]);
    assert_err!(result, LayerError::PreconditionViolation(_));
    Ok(())
}

#[test]
fn test_propagate_down_false_leaves_diff() -> Result<(), LayerError> {
    let mut ctx = Context::new_with_seed(1703);
    let mut bottom = constant_bottom();
    let mut layer = dropout(0.5);
    let mut top = setup(&mut layer, &bottom)?;
    layer.forward(&mut ctx, &[&bottom], &mut [&mut top])?;

    top.diff_mut().fill(1.);
    bottom.diff_mut().fill(5.);
    layer.backward(&mut ctx, &[&top], false, &mut [&mut bottom])?;
    assert_eq!(bottom.diff(), &Tensor::full(5., &[2, 3, 6, 5]));
    Ok(())
}

#[test]
fn test_call_order_and_shape_violations() -> Result<(), LayerError> {
    let mut ctx = Context::new_with_seed(1703);
    let bottom = constant_bottom();
    let mut top = Blob::new(2, 3, 6, 5);
    let mut layer = dropout(0.5);

    let result = layer.forward(&mut ctx, &[&bottom], &mut [&mut top]);
    assert_err!(result, LayerError::PreconditionViolation("Dropout层尚未 setup"));

    layer.setup(&[&bottom], &mut [&mut top])?;
    let other = Blob::new(2, 3, 3, 2);
    let result = layer.forward(&mut ctx, &[&other], &mut [&mut top]);
    assert_err!(
        result,
        LayerError::ShapeMismatch(
            [2, 3, 6, 5],
            [2, 3, 3, 2],
            "Dropout 层的形状与 setup 时不一致，请重新 setup"
        )
    );

    let result = layer.forward(&mut ctx, &[], &mut [&mut top]);
    assert_err!(
        result,
        LayerError::InvalidConfiguration("Dropout层需要恰好1个输入，得到0个")
    );
    Ok(())
}
