use crate::assert_panic;
use crate::nn::Blob;
use crate::tensor::Tensor;

#[test]
fn test_new_blob() {
    let blob = Blob::new(2, 3, 6, 5);
    assert_eq!(blob.shape(), [2, 3, 6, 5]);
    assert_eq!(blob.num(), 2);
    assert_eq!(blob.channels(), 3);
    assert_eq!(blob.height(), 6);
    assert_eq!(blob.width(), 5);
    assert_eq!(blob.count(), 180);
    assert!(blob.data().is_same_shape(blob.diff()));
    assert_eq!(blob.data().sum(), 0.);
}

#[test]
fn test_from_data() {
    let blob = Blob::from_data(Tensor::full(2., &[1, 2, 2, 2]));
    assert_eq!(blob.shape(), [1, 2, 2, 2]);
    assert_eq!(blob.data().sum(), 16.);
    assert_eq!(blob.diff(), &Tensor::zeros(&[1, 2, 2, 2]));
}

#[test]
fn test_from_data_requires_4d() {
    assert_panic!(
        Blob::from_data(Tensor::zeros(&[2, 2])),
        "Blob 须为 4 维 [num, channels, height, width]，得到 [2, 2]"
    );
}

#[test]
fn test_reshape() {
    let mut blob = Blob::from_data(Tensor::full(1., &[1, 1, 2, 2]));

    // 形状不变：保留原值
    blob.reshape(1, 1, 2, 2);
    assert_eq!(blob.data().sum(), 4.);

    // 形状改变：data 与 diff 一起重新分配并清零
    blob.reshape(2, 3, 3, 2);
    assert_eq!(blob.shape(), [2, 3, 3, 2]);
    assert_eq!(blob.diff().shape(), &[2, 3, 3, 2]);
    assert_eq!(blob.data().sum(), 0.);
}

#[test]
fn test_reshape_like() {
    let source = Blob::new(2, 3, 3, 2);
    let mut blob = Blob::default();
    assert_eq!(blob.count(), 0);
    blob.reshape_like(&source);
    assert_eq!(blob.shape(), source.shape());
}

#[test]
fn test_mut_access_keeps_shape() {
    let mut blob = Blob::new(1, 1, 2, 2);
    // 可变访问只暴露值，data 与 diff 的形状始终一致
    assert_eq!(blob.data_mut().len(), blob.count());
    assert_eq!(blob.diff_mut().len(), blob.count());

    blob.data_mut().copy_from_slice(&[1., 2., 3., 4.]);
    blob.diff_mut().fill(0.5);
    assert_eq!(blob.shape(), [1, 1, 2, 2]);
    assert!(blob.data().is_same_shape(blob.diff()));
    assert_eq!(blob.data()[[0, 0, 1, 0]], 3.);
    assert_eq!(blob.diff().sum(), 2.);

    // 长度不符的写入在切片层面就被拒绝
    assert_panic!(blob.diff_mut().copy_from_slice(&[1.]));
    assert_eq!(blob.diff().shape(), &[1, 1, 2, 2]);
}
