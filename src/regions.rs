// Free-text location classification.
//
// Source cells look like `"<渠道> | <地区短语>"`, written with whichever
// vertical-bar character the author's keyboard produced. Only the text
// after the last bar means anything; it is matched first against a
// city→province index and then, as a fallback, against the provinces of
// each region. A phrase that matches nothing classifies as `""`, which
// is a valid outcome, not an error.
use once_cell::sync::Lazy;
use serde::Deserialize;
use std::path::Path;

/// Non-ASCII delimiter variants seen in real extracts (the CJK vertical
/// stroke and the fullwidth bar), each rewritten to the ASCII bar that
/// `area_phrase` splits on.
const BAR_VARIANTS: [char; 2] = ['丨', '｜'];

/// Built-in prefecture-level city list, grouped by province. Flattened
/// in this declaration order to form the city index; "first match" in
/// `classify` means first in this order.
static PROVINCE_CITIES: &[(&str, &[&str])] = &[
    ("浙江", &["杭州", "宁波", "温州", "嘉兴", "湖州", "绍兴", "金华", "衢州", "舟山", "台州", "丽水"]),
    ("江苏", &["南京", "苏州", "无锡", "常州", "徐州", "南通", "连云港", "淮安", "盐城", "扬州", "镇江", "泰州", "宿迁"]),
    ("安徽", &["合肥", "芜湖", "蚌埠", "淮南", "马鞍山", "淮北", "铜陵", "安庆", "黄山", "阜阳", "宿州", "滁州", "六安", "宣城", "池州", "亳州"]),
    ("江西", &["南昌", "九江", "景德镇", "萍乡", "新余", "鹰潭", "赣州", "吉安", "宜春", "抚州", "上饶"]),
    ("福建", &["福州", "厦门", "莆田", "三明", "泉州", "漳州", "南平", "龙岩", "宁德"]),
    ("上海", &["上海"]),
    ("北京", &["北京"]),
    ("天津", &["天津"]),
    ("河北", &["石家庄", "唐山", "秦皇岛", "邯郸", "邢台", "保定", "张家口", "承德", "沧州", "廊坊", "衡水"]),
    ("山西", &["太原", "大同", "阳泉", "长治", "晋城", "朔州", "晋中", "运城", "忻州", "临汾", "吕梁"]),
    ("内蒙古", &["呼和浩特", "包头", "乌海", "赤峰", "通辽", "鄂尔多斯", "呼伦贝尔", "巴彦淖尔", "乌兰察布", "兴安盟", "锡林郭勒盟", "阿拉善盟"]),
    ("广东", &["广州", "深圳", "珠海", "汕头", "佛山", "韶关", "湛江", "肇庆", "江门", "茂名", "惠州", "梅州", "汕尾", "河源", "阳江", "清远", "东莞", "中山", "潮州", "揭阳", "云浮"]),
    ("广西", &["南宁", "柳州", "桂林", "梧州", "北海", "防城港", "钦州", "贵港", "玉林", "百色", "贺州", "河池", "来宾", "崇左"]),
    ("海南", &["海口", "三亚", "三沙", "儋州"]),
    ("四川", &["成都", "自贡", "攀枝花", "泸州", "德阳", "绵阳", "广元", "遂宁", "内江", "乐山", "南充", "眉山", "宜宾", "广安", "达州", "雅安", "巴中", "资阳", "阿坝藏族羌族自治州", "甘孜藏族自治州", "凉山彝族自治州"]),
    ("重庆", &["重庆"]),
    ("云南", &["昆明", "曲靖", "玉溪", "保山", "昭通", "丽江", "普洱", "临沧", "楚雄彝族自治州", "红河哈尼族彝族自治州", "文山壮族苗族自治州", "西双版纳傣族自治州", "大理白族自治州", "德宏傣族景颇族自治州", "怒江傈僳族自治州", "迪庆藏族自治州"]),
    ("贵州", &["贵阳", "六盘水", "遵义", "安顺", "毕节", "铜仁", "黔西南布依族苗族自治州", "黔东南苗族侗族自治州", "黔南布依族苗族自治州"]),
    ("西藏", &["拉萨", "日喀则", "昌都", "林芝", "山南", "那曲", "阿里地区"]),
    ("陕西", &["西安", "铜川", "宝鸡", "咸阳", "渭南", "延安", "汉中", "榆林", "安康", "商洛"]),
    ("甘肃", &["兰州", "嘉峪关", "金昌", "白银", "天水", "武威", "张掖", "平凉", "酒泉", "庆阳", "定西", "陇南", "临夏回族自治州", "甘南藏族自治州"]),
    ("宁夏", &["银川", "石嘴山", "吴忠", "固原", "中卫"]),
    ("青海", &["西宁", "海东", "海北藏族自治州", "黄南藏族自治州", "海南藏族自治州", "果洛藏族自治州", "玉树藏族自治州", "海西蒙古族藏族自治州"]),
    ("新疆", &["乌鲁木齐", "克拉玛依", "吐鲁番", "哈密", "昌吉回族自治州", "博尔塔拉蒙古自治州", "巴音郭楞蒙古自治州", "阿克苏地区", "克孜勒苏柯尔克孜自治州", "喀什", "喀什地区", "和田地区", "伊犁哈萨克自治州", "塔城地区", "阿勒泰地区"]),
    ("山东", &["济南", "青岛", "淄博", "枣庄", "东营", "烟台", "潍坊", "济宁", "泰安", "威海", "日照", "临沂", "德州", "聊城", "滨州", "菏泽"]),
    ("河南", &["郑州", "开封", "洛阳", "平顶山", "安阳", "鹤壁", "新乡", "焦作", "濮阳", "许昌", "漯河", "三门峡", "南阳", "商丘", "信阳", "周口", "驻马店"]),
    ("湖北", &["武汉", "黄石", "十堰", "宜昌", "襄阳", "鄂州", "荆门", "孝感", "荆州", "黄冈", "咸宁", "随州", "恩施土家族苗族自治州"]),
    ("湖南", &["长沙", "株洲", "湘潭", "衡阳", "邵阳", "岳阳", "常德", "张家界", "益阳", "郴州", "永州", "怀化", "娄底", "湘西土家族苗族自治州"]),
    ("黑龙江", &["哈尔滨", "齐齐哈尔", "鸡西", "鹤岗", "双鸭山", "大庆", "伊春", "佳木斯", "七台河", "牡丹江", "黑河", "绥化", "大兴安岭地区"]),
    ("吉林", &["长春", "吉林", "四平", "辽源", "通化", "白山", "松原", "白城", "延边朝鲜族自治州"]),
    ("辽宁", &["沈阳", "大连", "鞍山", "抚顺", "本溪", "丹东", "锦州", "营口", "阜新", "辽阳", "盘锦", "铁岭", "朝阳", "葫芦岛"]),
];

/// The eight sales regions and the provinces each one covers, in the
/// order rollups are reported.
static REGION_PROVINCES: &[(&str, &[&str])] = &[
    ("东南大区", &["浙江", "江西", "福建"]),
    ("华东大区", &["上海", "江苏", "安徽"]),
    ("华北大区", &["北京", "天津", "河北", "山西", "内蒙古"]),
    ("华南大区", &["广东", "广西", "海南"]),
    ("西南大区", &["四川", "重庆", "云南", "贵州", "西藏"]),
    ("西北大区", &["陕西", "甘肃", "宁夏", "青海", "新疆"]),
    ("中东大区", &["山东", "河南", "湖北", "湖南"]),
    ("东北大区", &["黑龙江", "吉林", "辽宁"]),
];

static BUILTIN: Lazy<RegionTables> = Lazy::new(|| {
    let cities = PROVINCE_CITIES
        .iter()
        .flat_map(|(province, cities)| {
            cities
                .iter()
                .map(move |city| (city.to_string(), province.to_string()))
        })
        .collect();
    let regions = REGION_PROVINCES
        .iter()
        .map(|(region, provinces)| {
            (
                region.to_string(),
                provinces.iter().map(|p| p.to_string()).collect(),
            )
        })
        .collect();
    RegionTables { cities, regions }
});

/// On-disk shape of a swapped-in administrative hierarchy.
#[derive(Debug, Deserialize)]
struct RegionTablesFile {
    provinces: Vec<ProvinceEntry>,
    regions: Vec<RegionEntry>,
}

#[derive(Debug, Deserialize)]
struct ProvinceEntry {
    province: String,
    cities: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RegionEntry {
    region: String,
    provinces: Vec<String>,
}

/// Immutable lookup tables: an ordered city→province index and an
/// ordered region→province-set index. Built once at startup and shared
/// by reference; iteration order is the declaration order, which is
/// what makes ambiguous substring matches deterministic.
#[derive(Debug, Clone)]
pub struct RegionTables {
    cities: Vec<(String, String)>,
    regions: Vec<(String, Vec<String>)>,
}

impl RegionTables {
    /// The built-in China hierarchy.
    pub fn builtin() -> &'static RegionTables {
        &BUILTIN
    }

    /// Load a replacement hierarchy from JSON. List order in the file
    /// becomes the lookup order.
    pub fn from_file(path: &Path) -> crate::error::Result<RegionTables> {
        let text = std::fs::read_to_string(path)?;
        let file: RegionTablesFile = serde_json::from_str(&text)?;
        let cities = file
            .provinces
            .iter()
            .flat_map(|entry| {
                entry
                    .cities
                    .iter()
                    .map(|city| (city.clone(), entry.province.clone()))
            })
            .collect();
        let regions = file
            .regions
            .into_iter()
            .map(|entry| (entry.region, entry.provinces))
            .collect();
        Ok(RegionTables { cities, regions })
    }

    /// Region names in reporting order.
    pub fn region_names(&self) -> impl Iterator<Item = &str> {
        self.regions.iter().map(|(name, _)| name.as_str())
    }

    /// Extract the area phrase: the segment after the last delimiter,
    /// trimmed. Text without any delimiter has no area phrase.
    pub fn area_phrase(&self, text: &str) -> String {
        let mut normalized = text.to_string();
        for bar in BAR_VARIANTS {
            normalized = normalized.replace(bar, " | ");
        }
        let parts: Vec<&str> = normalized.split('|').collect();
        if parts.len() > 1 {
            parts.last().map(|s| s.trim().to_string()).unwrap_or_default()
        } else {
            String::new()
        }
    }

    /// Resolve a raw location string to a region name, or `""`.
    ///
    /// The city pass has priority: the first city of the index that
    /// appears as a substring of the area phrase decides the province,
    /// and that province decides the region. Only when no city matches
    /// does the fallback pass look for a province name directly in the
    /// phrase. Both passes are first-match in table order; overlapping
    /// names resolve deterministically but the winner is a tie-break
    /// policy, not a semantic judgement.
    pub fn classify(&self, text: &str) -> String {
        let area = self.area_phrase(text);
        if area.is_empty() {
            return String::new();
        }

        if let Some((_, province)) = self.cities.iter().find(|(city, _)| area.contains(city.as_str())) {
            return self
                .regions
                .iter()
                .find(|(_, provinces)| provinces.iter().any(|p| p == province))
                .map(|(region, _)| region.clone())
                .unwrap_or_default();
        }

        self.regions
            .iter()
            .find(|(_, provinces)| provinces.iter().any(|p| area.contains(p.as_str())))
            .map(|(region, _)| region.clone())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delimiter_variants_are_interchangeable() {
        let tables = RegionTables::builtin();
        let a = tables.classify("渠道丨浙江杭州");
        let b = tables.classify("渠道｜浙江杭州");
        let c = tables.classify("渠道 | 浙江杭州");
        assert_eq!(a, "东南大区");
        assert_eq!(a, b);
        assert_eq!(a, c);
    }

    #[test]
    fn only_text_after_last_delimiter_counts() {
        let tables = RegionTables::builtin();
        assert_eq!(tables.area_phrase("活动丨华东丨江苏南京"), "江苏南京");
        assert_eq!(tables.classify("活动丨华东丨江苏南京"), "华东大区");
    }

    #[test]
    fn city_pass_wins_over_province_pass() {
        let tables = RegionTables::builtin();
        // 杭州 (city, 东南大区) appears alongside 广东 (province, 华南大区);
        // the city pass decides.
        assert_eq!(tables.classify("渠道丨杭州广东"), "东南大区");
    }

    #[test]
    fn unresolved_input_is_empty_not_an_error() {
        let tables = RegionTables::builtin();
        assert_eq!(tables.classify(""), "");
        assert_eq!(tables.classify("no-delimiter-text"), "");
        assert_eq!(tables.classify("渠道丨火星"), "");
    }

    #[test]
    fn missing_delimiter_means_no_area_phrase() {
        let tables = RegionTables::builtin();
        // 北京 would classify if it were an area phrase, but without a
        // delimiter there is none.
        assert_eq!(tables.classify("北京"), "");
        assert_eq!(tables.classify("渠道丨北京"), "华北大区");
    }

    #[test]
    fn classify_is_deterministic() {
        let tables = RegionTables::builtin();
        let first = tables.classify("渠道｜四川成都");
        for _ in 0..3 {
            assert_eq!(tables.classify("渠道｜四川成都"), first);
        }
        assert_eq!(first, "西南大区");
    }

    #[test]
    fn region_order_is_declaration_order() {
        let tables = RegionTables::builtin();
        let names: Vec<&str> = tables.region_names().collect();
        assert_eq!(names.len(), 8);
        assert_eq!(names[0], "东南大区");
        assert_eq!(names[7], "东北大区");
    }
}
