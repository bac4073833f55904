//! NCX导航元素数据结构定义

/// NCX元数据信息
#[derive(Debug, Clone, Default)]
pub struct NcxMetadata {
    /// 唯一标识符（dtb:uid）
    pub uid: Option<String>,
    /// 导航深度（dtb:depth）
    pub depth: Option<u32>,
}

/// 导航点
#[derive(Debug, Clone, PartialEq)]
pub struct NavPoint {
    /// 唯一标识符
    pub id: String,
    /// 播放顺序
    pub play_order: u32,
    /// 导航标签文本
    pub label: String,
    /// 内容引用（相对于NCX文件）
    pub src: String,
    /// 子导航点
    pub children: Vec<NavPoint>,
}

impl NavPoint {
    /// 创建新的导航点
    pub fn new(id: String, play_order: u32, label: String, src: String) -> Self {
        Self {
            id,
            play_order,
            label,
            src,
            children: Vec::new(),
        }
    }

    /// 以此导航点为根的子树深度
    pub fn depth(&self) -> u32 {
        1 + self.children.iter().map(NavPoint::depth).max().unwrap_or(0)
    }

    fn sort_by_play_order(&mut self) {
        self.children.sort_by_key(|child| child.play_order);
        for child in &mut self.children {
            child.sort_by_play_order();
        }
    }
}

/// 导航地图
#[derive(Debug, Clone, Default)]
pub struct NavMap {
    pub nav_points: Vec<NavPoint>,
}

impl NavMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加顶层导航点
    pub fn add_nav_point(&mut self, nav_point: NavPoint) {
        self.nav_points.push(nav_point);
    }

    /// 最大嵌套深度
    pub fn depth(&self) -> u32 {
        self.nav_points.iter().map(NavPoint::depth).max().unwrap_or(0)
    }

    /// 按playOrder排序（同级之间稳定排序，缺省的0保持文档顺序）
    pub fn sort_by_play_order(&mut self) {
        self.nav_points.sort_by_key(|point| point.play_order);
        for point in &mut self.nav_points {
            point.sort_by_play_order();
        }
    }

    pub fn is_empty(&self) -> bool {
        self.nav_points.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(id: &str, order: u32) -> NavPoint {
        NavPoint::new(id.to_string(), order, id.to_string(), format!("{}.xhtml", id))
    }

    #[test]
    fn test_depth_and_sort() {
        let mut parent = point("b", 2);
        parent.children.push(point("b2", 4));
        parent.children.push(point("b1", 3));

        let mut map = NavMap::new();
        map.add_nav_point(parent);
        map.add_nav_point(point("a", 1));
        map.sort_by_play_order();

        assert_eq!(map.depth(), 2);
        assert_eq!(map.nav_points[0].id, "a");
        assert_eq!(map.nav_points[1].children[0].id, "b1");
    }
}
