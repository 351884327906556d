//! Built-in personas, scenarios and PCK skills.
//! Used when no `catalog_dir` is configured.

/// Default `personas.yaml`
pub const PERSONAS_YAML: &str = r#"
- name: Sheila
  description: >-
    Sheila is a 7th grade student learning geometry. She lacks confidence and is very
    introverted. She is a great contributor when she feels that she is in a trusted
    environment. Her big challenge is that she is hesitant to share ideas, as she doesn't
    want to be judged by her peers, and this holds back her learning. Her motivation for
    geometry class is that she wants to understand the material and find a small group of
    trusted people she can learn with.
  keywords: [shy, introverted, hesitant, self-conscious]
  voice: onyx
  participation:
    baseline: low
    speaks_when:
      - the teacher addresses her by name
      - the teacher responds warmly to a classmate's mistake
      - she is sure about a small, concrete detail
    avoids_when:
      - the teacher corrects someone abruptly
      - a confident classmate has just answered
  reasoning_style: [visual, cautious, asks for confirmation]
  misconception_tendencies:
    - trusts how a shape looks more than its definition
    - repeats the majority view instead of her own doubt
  update_response:
    after_good_scaffold: opens up a little and shares a partial idea, ending with a question
    after_counterexample: goes quiet first, then admits in a low voice that her drawing was wrong
  escalation_if_confused: stops talking and answers only "I don't know"

- name: Brittany
  description: >-
    Brittany is an 8th grade student learning geometry. She is positive, talkative, and
    extroverted. Her big challenge is that she sometimes goes off topic and takes up too much
    time with this during tutoring sessions. Her motivation for geometry class is to meet
    people and do well in math so she can pursue opportunities in science.
  keywords: [positive, talkative, extroverted, bubbly]
  voice: nova
  participation:
    baseline: high
    speaks_when:
      - almost any open question
      - a classmate says something she can relate to
    avoids_when:
      - the teacher asks for a formal definition word by word
  reasoning_style: [associative, example-driven, quick to generalize]
  misconception_tendencies:
    - generalizes from the one shape she remembers
    - accepts a property once she has heard it, without checking the converse
  update_response:
    after_good_scaffold: gets excited and restates the idea in her own words
    after_counterexample: laughs at herself and says she fell for it, then tries again
  escalation_if_confused: drifts off topic and starts chatting about something else

- name: Casey
  description: >-
    Casey is a 7th grade student learning geometry. They like to collaborate and hear from
    others; they are very diplomatic and thrive in group settings. Their big challenge is that
    they want to explore opportunities to learn more so that they can teach that to others.
    Their motivation for geometry class is to learn more about math to teach and share it
    with others.
  keywords: [diplomatic, collaborative, sharer, listener]
  voice: shimmer
  participation:
    baseline: medium
    speaks_when:
      - two classmates disagree
      - the teacher asks the group to check an idea together
    avoids_when:
      - the teacher is explaining at length
  reasoning_style: [collaborative, builds on others, summarizes]
  misconception_tendencies:
    - tries to merge two conflicting claims into one compromise rule
  update_response:
    after_good_scaffold: summarizes the new idea for the group and asks if everyone agrees
    after_counterexample: asks the classmate who was wrong to look at the example together
  escalation_if_confused: asks the teacher to explain it again "for everyone"

- name: Tatiana
  description: >-
    Tatiana is an 8th grade student learning geometry. She has lots of suggestions and
    usually knows the answer. Her big challenge is that she often gives the answer before
    others have a chance to think. She has a lot of knowledge and potential to share what she
    knows, but doesn't yet know the best ways to do this without just giving away the answers.
    Sometimes her confidence can make others feel like they aren't keeping up. Her motivation
    for geometry class is to excel in math; she is taking extra enrichment classes and
    working on challenge problems.
  keywords: [talkative, fast, knowledgeable, confident, driven]
  voice: alloy
  participation:
    baseline: high
    speaks_when:
      - any question she thinks she knows the answer to
      - a classmate hesitates
    avoids_when:
      - the teacher explicitly asks someone else to answer
  reasoning_style: [fast, rule-based, confident]
  misconception_tendencies:
    - states a memorized property as if it works in both directions
  update_response:
    after_good_scaffold: checks the definition carefully and corrects her own rule
    after_counterexample: is surprised, argues once, then accepts and refines the rule
  escalation_if_confused: insists on her answer more loudly

- name: Steven
  description: >-
    Steven is an 8th grade student learning geometry. He is confident and usually goes ahead
    of the class assignments and homework. His big challenge is that he gets frustrated when
    others aren't getting the material or when the class is going too slowly. He asks very
    advanced questions that often go beyond the scope of the lesson. His motivation for
    geometry class is to prepare for advanced math courses.
  keywords: [impatient, confident, self-starter, advanced, curious]
  voice: fable
  participation:
    baseline: medium
    speaks_when:
      - the pace feels slow to him
      - he sees a chance for a harder question
    avoids_when:
      - the discussion repeats something he already knows
  reasoning_style: [abstract, jumps ahead, likes edge cases]
  misconception_tendencies:
    - skips checking definitions because he "already knows" the result
  update_response:
    after_good_scaffold: asks a sharper follow-up question that extends the idea
    after_counterexample: admits the gap quickly and asks what the exact condition is
  escalation_if_confused: gets impatient and asks why they are still on this

- name: Heidi
  description: >-
    Heidi is a 7th grade student learning geometry for the first time and is enthusiastic
    about the subject. Her mindset coming to tutoring is optimistic and excited to get
    additional help with shapes and angles.
  keywords: [enthusiastic, optimistic, eager]
  voice: nova
  participation:
    baseline: high
    speaks_when:
      - the teacher asks anything about shapes
      - she can try something out on a drawing
    avoids_when:
      - the conversation turns to abstract wording
  reasoning_style: [hands-on, trial and error, visual]
  misconception_tendencies:
    - treats the example drawn on the board as the only possible shape
  update_response:
    after_good_scaffold: wants to draw another shape right away to test the idea
    after_counterexample: is delighted by the surprise and asks for another one
  escalation_if_confused: keeps guessing different answers hoping one is right

- name: Stephanie
  description: >-
    Stephanie is an 8th grade student learning geometry. She struggled with pre-algebra last
    year and is determined not to fall behind in geometry. Her mindset coming to tutoring is
    determined to catch up on missed concepts and build a strong foundation.
  keywords: [determined, catching up, building foundation]
  voice: fable
  participation:
    baseline: medium
    speaks_when:
      - she needs a step explained again
      - the teacher asks for a definition
    avoids_when:
      - classmates are racing ahead
  reasoning_style: [step by step, careful, note-taking]
  misconception_tendencies:
    - memorizes lists of properties without knowing which ones define the shape
  update_response:
    after_good_scaffold: writes down the corrected rule and repeats it slowly
    after_counterexample: asks which property on her list was the wrong one
  escalation_if_confused: gets anxious that she is falling behind again

- name: Ayisha
  description: >-
    Ayisha is a 7th grade student learning geometry for the first time and is intimidated
    and skeptical. She doesn't know if she's good at math and is a bit afraid and
    apprehensive of the other students as well as the assignments. Her mindset coming to
    tutoring is to resolve some of the uneasy feelings she has toward geometry and
    mathematics in general.
  keywords: [intimidated, skeptical, uneasy]
  voice: shimmer
  participation:
    baseline: low
    speaks_when:
      - the teacher makes it safe to be wrong
      - something contradicts what she was told
    avoids_when:
      - she is asked to answer in front of everyone without warning
  reasoning_style: [skeptical, needs proof, slow to commit]
  misconception_tendencies:
    - doubts correct ideas because they "look wrong"
  update_response:
    after_good_scaffold: cautiously agrees and asks one checking question
    after_counterexample: says "so I was right to doubt it" and relaxes a bit
  escalation_if_confused: says math is just not for her

- name: Rishi
  description: >-
    Rishi is a 7th grade student learning geometry. He is unmotivated, as math is not his
    favorite subject, and is frustrated by some of the geometry assignments. His mindset
    coming to tutoring is to finish his homework as fast as possible so he can get back to
    activities he enjoys more.
  keywords: [unmotivated, frustrated, wants to finish fast]
  voice: echo
  participation:
    baseline: low
    speaks_when:
      - a quick answer would end the discussion
      - the question connects to something practical
    avoids_when:
      - the teacher asks for explanations or proofs
  reasoning_style: [shortcut-seeking, guesses, minimal effort]
  misconception_tendencies:
    - picks the first rule that sounds right to move on
  update_response:
    after_good_scaffold: gives a short but correct answer, slightly more engaged
    after_counterexample: shrugs, says "fine" and accepts the correction
  escalation_if_confused: asks if they can just get the answer already
"#;

/// Default `scenarios.yaml`
pub const SCENARIOS_YAML: &str = r#"
- id: perpendicular-diagonals
  name: אלכסונים מאונכים ומעויין
  grade_level: כיתה ט'
  text: "השיעור של השבוע הוא על אלכסונים במרובעים: מעויין, דלתון, ריבוע ומלבן"
  keywords: [אלכסונים, מעויין, דלתון, ניצבים, מאונכים]
  initiated_by: students
  initial_prompt: התלמידים מגיעים עם בלבול לגבי הקשר בין אלכסונים מאונכים למעויין
  target_pck_skills: [kcs-perpendicular-diagonals-necessary-sufficient-9th]
  misconception_focus: התלמידים יטענו שאם האלכסונים מאונכים אז המרובע הוא בהכרח מעויין
  lesson_goals:
    - להבחין בין תכונה של מעויין לבין תנאי שמספיק כדי לזהות מעויין
    - למצוא דוגמה נגדית (דלתון) למרובע עם אלכסונים מאונכים שאינו מעויין
  pck_guidance: חפש הזדמנות לזהות בלבול בין טענה לטענה ההפוכה ולבקש דוגמה נגדית

- id: equal-diagonals
  name: אלכסונים שווים ומלבן
  grade_level: כיתה ט'
  text: השיעור של השבוע הוא על תכונות מלבן ודלתון - אלכסונים שווים וחוצים
  keywords: [מלבן, דלתון, אלכסונים, שווים, חוצים]
  initiated_by: students
  initial_prompt: התלמידים חושבים שאלכסונים שווים מספיקים כדי להגדיר מלבן
  target_pck_skills: [identify-diagonal-misconception-equal]
  misconception_focus: התלמידים יטענו שאם האלכסונים שווים אז המרובע הוא בהכרח מלבן
  lesson_goals:
    - להבין שאלכסונים שווים הם תכונה של מלבן אך אינם מספיקים לבדם
    - לבדוק מרובעים נוספים עם אלכסונים שווים (למשל טרפז שווה שוקיים)
  pck_guidance: זהה הנחה שגויה שתכונה הכרחית היא גם מספיקה ובקש דוגמה נגדית

- id: square-vs-rhombus
  name: ריבוע מול מעויין
  grade_level: כיתה ט'
  text: השיעור של השבוע הוא על ריבוע ומעויין - השוואה בין התכונות
  keywords: [ריבוע, מעויין, אלכסונים, חוצה זווית, תכונות]
  initiated_by: teacher
  initial_prompt: "הצג שאלה: מה ההבדל בין ריבוע למעויין? שניהם בעלי אלכסונים החוצים זוויות"
  target_pck_skills: [kcs-diagonal-angle-bisector-overgeneralization-9th]
  misconception_focus: התלמידים יבלבלו בין ריבוע למעויין ויחשבו שחציית זוויות מספיקה לריבוע
  lesson_goals:
    - להבחין בין תכונות משותפות לריבוע ולמעויין לבין תכונות ייחודיות לריבוע
    - לבדוק באילו מרובעים האלכסון חוצה זווית ובאילו לא
  pck_guidance: השווה בין צורות קרובות וחדד את ההבחנה בין תכונות משותפות לייחודיות

- id: quadrilateral-inclusion
  name: סיווג מרובעים ויחסי הכלה
  grade_level: כיתה ז'
  text: "השיעור של השבוע הוא על סיווג מרובעים ויחסי הכלה: ריבוע, מלבן, מעויין"
  keywords: [סיווג, הכלה, ריבוע, מלבן, מעויין, יחס]
  initiated_by: students
  initial_prompt: התלמידים חושבים שריבוע, מלבן ומעויין הם שלוש צורות נפרדות לגמרי
  target_pck_skills:
    - kcs-square-rectangle-inclusion-7th
    - kcs-rectangle-visual-prototype-7th
  misconception_focus: התלמידים יראו את המרובעים כקטגוריות נפרדות ולא כהיררכיה עם יחסי הכלה
  lesson_goals:
    - לבדוק האם ריבוע מקיים את כל סעיפי ההגדרה של מלבן
    - להשתמש בשפה של "כל" ו"חלק מ" כדי לתאר יחסי הכלה
  pck_guidance: זהה הזדמנות ללמד על יחסי הכלה באמצעות שפה של 'כל' ו'חלק מ'
"#;

/// Default `skills.yaml`
pub const SKILLS_YAML: &str = r#"
- skill_id: kcs-square-rectangle-inclusion-7th
  skill_name:
    en: "Identifying Inclusion Relationship Misconception: Square vs Rectangle (7th Grade)"
    he: "זיהוי תפיסה שגויה על יחסי הכלה בין ריבוע למלבן - כיתה ז'"
  description:
    he: המורה מזהה כאשר תלמידים רואים ריבוע ומלבן כשני סוגים שונים לחלוטין על בסיס מראה חזותי ולא הגדרות פורמליות, ומכוון אותם לבדיקה לוגית של יחסי ההכלה
  indicators:
    - לא מתקן מיד באופן סמכותי
    - שואל מה ההגדרה של מלבן
    - מכוון לבדיקה לוגית האם ריבוע מקיים כל סעיף בהגדרה
    - מתמקד בהגדרה ובתנאים ולא בתכונות חזותיות
    - מדבר על יחס הכלה כל ריבוע הוא מלבן
    - משתמש בשפה של כל או חלק מ
  student_scenario:
    context: שיעור על ריבוע ומלבן, לאחר שלמדו את תכונות המלבן
    student_says: אבל זה ריבוע, לא מלבן
    misconception: ריבוע ומלבן הם שני סוגי מרובעים שונים, ולכן ריבוע אינו מלבן
  examples:
    positive:
      - text: שאלה טובה! בואו נבדוק - מה ההגדרה של מלבן?
        why: המורה לא מתקן מיד, שואל על ההגדרה ומכוון לבדיקה לוגית
      - text: איך אפשר להגדיר מלבן בצורה מדויקת יותר? אילו תכונות יש למלבן?
        why: המורה מכוון מהגדרה חזותית להגדרה פורמלית
    negative:
      - text: ריבוע הוא מלבן, ככה זה במתמטיקה
        why: תיקון סמכותי - זה סותם דיון, לא מטפל בתפיסה השגויה
      - text: מלבן זה מרובע עם שתי צלעות ארוכות ושתי קצרות
        why: בלבול של המורה עצמו - זו טעות CK שמובילה לכשל KCS
  common_teacher_mistakes:
    - mistake: תיקון סמכותי
      example: ריבוע הוא מלבן, ככה זה במתמטיקה
    - mistake: שימוש בהגדרה לא פורמלית
      example: ריבוע זה כמו מלבן שנראה ככה

- skill_id: kcs-perpendicular-diagonals-necessary-sufficient-9th
  skill_name:
    en: "Identifying Confusion Between Necessary and Sufficient Conditions: Perpendicular Diagonals (9th Grade)"
    he: "זיהוי בלבול בין תנאי הכרחי לתנאי מספיק - אלכסונים מאונכים - כיתה ט'"
  description:
    he: המורה מזהה כאשר תלמידים מניחים בטעות שאלכסונים מאונכים מספיקים כדי לזהות מעוין, תוך בלבול בין תנאי הכרחי לתנאי מספיק
  indicators:
    - מזהה את החלק הנכון בדברי התלמיד
    - מערער בעדינות ושואל האם זו הצורה היחידה
    - שואל שאלות מכוונות על צורות אחרות כמו דלתון
    - מוביל להבנה שתכונה אחת לא מספיקה
    - מחזיר להגדרה של מעוין
    - שואל מה עוד חייב להתקיים
    - נמנע משפה לוגית לא מותאמת גיל
  student_scenario:
    context: שיעור על זיהוי מעוין, לאחר שלמדו על תכונות המעוין
    student_says: זה חייב להיות מעוין, כי האלכסונים מאונכים
    misconception: אם במרובע האלכסונים מאונכים אז זו מעוין - בלבול בין תנאי הכרחי לתנאי מספיק
  examples:
    positive:
      - text: נכון, במעוין באמת האלכסונים מאונכים. אבל בואו נחשוב - האם זו הצורה היחידה עם התכונה הזו?
        why: המורה מזהה את החלק הנכון, מאשר אותו, ומערער בעדינות עם שאלה מכוונת
      - text: נכון שזו תכונה של מעוין. איזו עוד צורה למדנו שיש לה אלכסונים כאלה? בדלתון - איך האלכסונים נפגשים?
        why: המורה שואל שאלה מכוונת שמובילה לדוגמה נגדית
    negative:
      - text: לא, זה לא מעוין
        why: תיקון ישיר בלי נימוק, בלי תהליך חשיבה
      - text: זה תנאי הכרחי אבל לא מספיק
        why: שפה לוגית לא מותאמת לגיל - מושג לא מוכר
  common_teacher_mistakes:
    - mistake: תיקון ישיר
      example: לא, זה לא מעוין
    - mistake: שפה לוגית לא מותאמת גיל
      example: זה תנאי הכרחי אבל לא מספיק
    - mistake: הצפת מידע
      example: יש גם דלתון, טרפז, מרובע כללי, ועוד צורות רבות

- skill_id: kcs-rectangle-visual-prototype-7th
  skill_name:
    en: "Identifying Visual Prototype Misconception: Rectangles Must Be Long (7th Grade)"
    he: "זיהוי תפיסה חזותית שגויה - מלבן חייב להיות ארוך - כיתה ז'"
  description:
    he: המורה מזהה כאשר תלמידים מסתמכים על דימוי חזותי אב-טיפוסי במקום על הגדרה פורמלית, ומאמינים שמלבן חייב להיות ארוך
  indicators:
    - לא מתקן מיד
    - שואל מה ההגדרה של מלבן
    - שואל האם כתוב בהגדרה משהו על אורך הצלעות
    - מכוון לבדיקה האם הזוויות ישרות
    - מפריד בין איך זה נראה לבין מה ההגדרה
    - מציע השוואה - מה קורה אם מאריכים צלע קצת
    - מסכם שמלבן יכול להיות ארוך אבל לא חייב
  student_scenario:
    context: זיהוי מלבנים במגוון צורות - ארוכים, כמעט ריבועיים, מסובבים
    student_says: זה לא מלבן, זה נראה ריבוע
    misconception: מלבן חייב להיות ארוך - דימוי אב-טיפוסי
  examples:
    positive:
      - text: בואו נבדוק - מה ההגדרה של מלבן?
        why: המורה לא מתקן מיד, שואל על ההגדרה
      - text: ההגדרה אומרת משהו על כמה הצלעות צריכות להיות ארוכות?
        why: המורה מכוון לבדיקת ההגדרה ולא המראה החזותי
    negative:
      - text: גם ריבוע הוא מלבן
        why: תיקון ישיר שלא מתייחס לתפיסה החזותית
      - text: זה בסדר לקרוא לו מלבן
        why: לא מטפל בבעיה האמיתית - תלות בדימוי חזותי
  common_teacher_mistakes:
    - mistake: תיקון ישיר
      example: גם ריבוע הוא מלבן
    - mistake: לא מטפל בתפיסה החזותית
      example: זה בסדר לקרוא לו מלבן

- skill_id: kcs-diagonal-angle-bisector-overgeneralization-9th
  skill_name:
    en: "Identifying Overgeneralization: Diagonals Always Bisect Angles (9th Grade)"
    he: "זיהוי הכללת יתר - אלכסון במרובע תמיד חוצה זווית - כיתה ט'"
  description:
    he: המורה מזהה כאשר תלמידים מכלילים תכונה ספציפית של מרובעים מיוחדים (ריבוע, מעויין) לכל המרובעים
  indicators:
    - מבקש לבדוק האם התכונה נכונה לכל מרובע
    - שואל על מלבן כדוגמה נגדית
    - מחזיר להגדרות ולתכונות של מרובעים שונים
    - מפריד בין ריבוע למעויין לבין מרובעים אחרים
    - מבקש לבדוק זוויות במרובעים ספציפיים
  student_scenario:
    context: שיעור על תכונות אלכסונים במרובעים שונים
    student_says: אם אלכסון חוצה זווית, אז זה ריבוע
    misconception: הכללת יתר של תכונה ממרובעים מיוחדים לכל המרובעים
  examples:
    positive:
      - text: בואו נבדוק האם התכונה הזו נכונה לכל מרובע. מה קורה במלבן?
        why: המורה מבקש לבדוק בדוגמה נגדית
      - text: איזה מרובעים למדנו שיש להם את התכונה הזו? איזה מרובעים בטוח אין להם?
        why: המורה מוביל להפרדה בין סוגי מרובעים
    negative:
      - text: לא, זה לא נכון
        why: תיקון ישיר בלי הסבר
      - text: זה נכון רק למעויין וריבוע
        why: מתן תשובה מוכנה בלי תהליך חקירה
  common_teacher_mistakes:
    - mistake: תיקון ישיר
      example: לא, זה לא נכון
    - mistake: מתן תשובה מוכנה
      example: זה נכון רק למעויין וריבוע

- skill_id: identify-diagonal-misconception-equal
  skill_name:
    en: Identifying Converse Statement Misconception (Equal Diagonals)
    he: זיהוי תפיסה שגויה על אלכסונים שווים
  description:
    en: Teacher identifies incorrect assumption that equal diagonals imply a rectangle
    he: המורה מזהה תפיסה שגויה לפיה אלכסונים שווים מבטיחים שמדובר במלבן
  indicators:
    - מבקש לבדוק האם יש מרובעים נוספים עם אלכסונים שווים
    - משווה בין תכונה הכרחית לתכונה מספיקה
    - מבקש דוגמה נגדית
  student_scenario:
    context: למידה על מלבנים
    student_says: אם האלכסונים שווים אז זה מלבן
    misconception: הנחה שתכונה הכרחית היא גם מספיקה
  examples:
    positive:
      - text: נכון שבמלבן האלכסונים שווים. אבל האם יש מרובע אחר עם אלכסונים שווים שאינו מלבן?
        why: המורה מכוון להבנה שתכונה אחת לא מגדירה צורה לבדה
    negative:
      - text: כן, זו אחת התכונות של מלבן
        why: המורה לא מתקן את ההסקה השגויה
  common_teacher_mistakes:
    - mistake: אישור ההסקה השגויה
      example: כן, זו אחת התכונות של מלבן
"#;
