use petgraph::unionfind::UnionFind;

use crate::flood::FloodedCellSet;

/// Метка сухой ячейки.
pub(crate) const DRY: usize = usize::MAX;

/// Разметка затопленных ячеек по компонентам 4-связности.
pub(crate) struct Components {
    /// Номер компоненты для каждой ячейки (`DRY` для незатопленных).
    pub labels: Vec<usize>,
    pub count: usize,
}

/// Номера компонент выдаются в порядке минимального индекса ячейки, поэтому
/// разметка детерминирована.
pub(crate) fn label_components(flooded: &FloodedCellSet) -> Components {
    let rows = flooded.rows();
    let cols = flooded.cols();
    let mask = flooded.mask();
    let mut sets = UnionFind::<usize>::new(rows * cols);

    for i in 0..rows {
        for j in 0..cols {
            let idx = i * cols + j;
            if !mask[idx] {
                continue;
            }
            if j + 1 < cols && mask[idx + 1] {
                sets.union(idx, idx + 1);
            }
            if i + 1 < rows && mask[idx + cols] {
                sets.union(idx, idx + cols);
            }
        }
    }

    let mut root_label = vec![DRY; rows * cols];
    let mut labels = vec![DRY; rows * cols];
    let mut count = 0;
    for idx in (0..rows * cols).filter(|&idx| mask[idx]) {
        let root = sets.find(idx);
        if root_label[root] == DRY {
            root_label[root] = count;
            count += 1;
        }
        labels[idx] = root_label[root];
    }

    Components { labels, count }
}
