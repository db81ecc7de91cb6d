/// Доля ширины главного окна, задающая базовый порог прилипания
const BASE_THRESHOLD_RATIO: f64 = 0.025;

/// Нижняя граница порога (маленькие экраны)
const MIN_THRESHOLD: i32 = 8;

/// Верхняя граница порога (большие мониторы)
const MAX_THRESHOLD: i32 = 40;

/// Множитель порога для диагонального (углового) прилипания
const CORNER_THRESHOLD_FACTOR: f64 = 1.5;

/// Адаптивный порог прилипания по ширине главного окна.
/// Неизвестная или нулевая ширина даёт минимальный порог
pub fn adaptive_threshold(primary_width: i32) -> i32 {
    if primary_width <= 0 {
        return MIN_THRESHOLD;
    }

    let threshold = (f64::from(primary_width) * BASE_THRESHOLD_RATIO) as i32;
    threshold.clamp(MIN_THRESHOLD, MAX_THRESHOLD)
}

/// Порог углового прилипания
pub fn corner_threshold(threshold: i32) -> f64 {
    f64::from(threshold) * CORNER_THRESHOLD_FACTOR
}
